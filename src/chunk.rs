use crate::config::{ITEMS_KEY, WRITE_BUF_SIZE};
use anyhow::{ensure, Context, Result};
use chrono::Local;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Serialization strategy for one chunk file. The allocator below owns the
/// boundary/remainder/collision logic; formats only turn a batch of records
/// into bytes.
pub trait ChunkFormat<R> {
    fn extension(&self) -> &'static str;

    fn write_chunk(&self, writer: &mut dyn Write, records: &[R]) -> Result<()>;
}

/// One JSON record per line.
pub struct NdjsonFormat;

impl<R: Serialize> ChunkFormat<R> for NdjsonFormat {
    fn extension(&self) -> &'static str {
        "ndjson"
    }

    fn write_chunk(&self, writer: &mut dyn Write, records: &[R]) -> Result<()> {
        for record in records {
            serde_json::to_writer(&mut *writer, record).context("Failed to serialize record")?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    }
}

/// A single JSON object with the records as an array under a fixed key.
pub struct JsonItemsFormat;

impl<R: Serialize> ChunkFormat<R> for JsonItemsFormat {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn write_chunk(&self, writer: &mut dyn Write, records: &[R]) -> Result<()> {
        let mut envelope = serde_json::Map::new();
        envelope.insert(
            ITEMS_KEY.to_string(),
            serde_json::to_value(records).context("Failed to serialize records")?,
        );
        serde_json::to_writer(&mut *writer, &envelope).context("Failed to serialize chunk")?;
        Ok(())
    }
}

/// Gzip-compressed JSON lines, matching OpenAIRE part files.
pub struct GzNdjsonFormat;

impl<R: Serialize> ChunkFormat<R> for GzNdjsonFormat {
    fn extension(&self) -> &'static str {
        "gz"
    }

    fn write_chunk(&self, writer: &mut dyn Write, records: &[R]) -> Result<()> {
        let mut encoder = GzEncoder::new(&mut *writer, Compression::default());
        for record in records {
            serde_json::to_writer(&mut encoder, record).context("Failed to serialize record")?;
            encoder.write_all(b"\n")?;
        }
        encoder.finish().context("Failed to finish gzip stream")?;
        Ok(())
    }
}

/// Delimited rows with a repeated header line.
pub struct CsvFormat {
    header: Vec<String>,
}

impl CsvFormat {
    pub fn new(header: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            header: header.into_iter().map(Into::into).collect(),
        }
    }
}

impl ChunkFormat<Vec<String>> for CsvFormat {
    fn extension(&self) -> &'static str {
        "csv"
    }

    fn write_chunk(&self, writer: &mut dyn Write, records: &[Vec<String>]) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(&mut *writer);
        csv_writer
            .write_record(&self.header)
            .context("Failed to write CSV header")?;
        for record in records {
            csv_writer
                .write_record(record)
                .context("Failed to write CSV row")?;
        }
        csv_writer.flush().context("Failed to flush CSV chunk")?;
        Ok(())
    }
}

/// Accumulates processed records and flushes them into numbered chunk files
/// of exactly `interval` records, plus one final undersized chunk for the
/// remainder at end-of-stream.
///
/// Invariants: a chunk is written exactly when the cumulative count is a
/// multiple of `interval`; the chunk index is `cumulative_count / interval`;
/// records land in the same relative order they were pushed. An existing
/// file with the computed name is never overwritten -- the writer falls back
/// to a timestamp-suffixed name instead, so a re-run against a populated
/// output directory cannot corrupt prior output.
pub struct ChunkWriter<R, F: ChunkFormat<R>> {
    output_dir: PathBuf,
    interval: u64,
    format: F,
    count: u64,
    buffer: Vec<R>,
    chunks_written: u64,
}

impl<R, F: ChunkFormat<R>> ChunkWriter<R, F> {
    pub fn new(output_dir: &Path, interval: u64, format: F) -> Result<Self> {
        ensure!(interval > 0, "Chunk interval must be a positive integer");
        fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create output directory: {:?}", output_dir))?;
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            interval,
            format,
            count: 0,
            buffer: Vec::new(),
            chunks_written: 0,
        })
    }

    /// Appends one record, flushing a complete chunk when the running count
    /// crosses an interval boundary.
    pub fn push(&mut self, record: R) -> Result<()> {
        self.buffer.push(record);
        self.count += 1;
        if self.count % self.interval == 0 {
            self.flush_chunk()?;
        }
        Ok(())
    }

    /// Flushes any trailing remainder and returns the number of chunks
    /// written. Must be called at end-of-stream; dropping the writer without
    /// it loses the remainder.
    pub fn finish(mut self) -> Result<u64> {
        if !self.buffer.is_empty() {
            // round the count up to the next boundary so the final chunk
            // gets the next index in sequence
            self.count += self.interval - (self.count % self.interval);
            self.flush_chunk()?;
        }
        Ok(self.chunks_written)
    }

    pub fn records_pushed(&self) -> u64 {
        self.count
    }

    fn flush_chunk(&mut self) -> Result<()> {
        let index = self.count / self.interval;
        let path = self.chunk_path(index);

        let tmp_path = path.with_extension("tmp");
        {
            let file = File::create(&tmp_path)
                .with_context(|| format!("Failed to create chunk file: {:?}", tmp_path))?;
            let mut writer = BufWriter::with_capacity(WRITE_BUF_SIZE, file);
            self.format.write_chunk(&mut writer, &self.buffer)?;
            writer
                .flush()
                .with_context(|| format!("Failed to flush chunk file: {:?}", tmp_path))?;
        }
        fs::rename(&tmp_path, &path)
            .with_context(|| format!("Failed to rename chunk file to: {:?}", path))?;

        debug!(index, records = self.buffer.len(), path = ?path, "Chunk written");

        self.buffer.clear();
        self.chunks_written += 1;
        Ok(())
    }

    fn chunk_path(&self, index: u64) -> PathBuf {
        let extension = self.format.extension();
        let plain = self
            .output_dir
            .join(format!("chunk_{}.{}", index, extension));
        if !plain.exists() {
            return plain;
        }
        let stamp = Local::now().format("%d%m%Y_%H%M%S");
        self.output_dir
            .join(format!("chunk_{}_{}.{}", index, stamp, extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use serde_json::{json, Value};
    use std::io::{BufRead, BufReader, Read};
    use tempfile::TempDir;

    fn ndjson_records(path: &Path) -> Vec<Value> {
        let file = File::open(path).unwrap();
        BufReader::new(file)
            .lines()
            .map(|l| serde_json::from_str(&l.unwrap()).unwrap())
            .collect()
    }

    fn chunk_files(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        files.sort();
        files
    }

    #[test]
    fn exact_multiple_produces_full_chunks_only() {
        let dir = TempDir::new().unwrap();
        let mut writer = ChunkWriter::new(dir.path(), 3, NdjsonFormat).unwrap();
        for i in 0..6 {
            writer.push(json!({"n": i})).unwrap();
        }
        let chunks = writer.finish().unwrap();
        assert_eq!(chunks, 2);

        let files = chunk_files(dir.path());
        assert_eq!(files.len(), 2);
        assert_eq!(ndjson_records(&files[0]).len(), 3);
        assert_eq!(ndjson_records(&files[1]).len(), 3);
    }

    #[test]
    fn remainder_lands_in_final_undersized_chunk() {
        let dir = TempDir::new().unwrap();
        let mut writer = ChunkWriter::new(dir.path(), 3, NdjsonFormat).unwrap();
        for i in 0..7 {
            writer.push(json!({"n": i})).unwrap();
        }
        let chunks = writer.finish().unwrap();
        assert_eq!(chunks, 3);

        let chunk_3 = dir.path().join("chunk_3.ndjson");
        assert!(chunk_3.exists());
        assert_eq!(ndjson_records(&chunk_3).len(), 1);
    }

    #[test]
    fn concatenated_chunks_reproduce_input_order() {
        let dir = TempDir::new().unwrap();
        let mut writer = ChunkWriter::new(dir.path(), 2, NdjsonFormat).unwrap();
        for i in 0..5 {
            writer.push(json!({"n": i})).unwrap();
        }
        writer.finish().unwrap();

        let mut all = Vec::new();
        for index in 1..=3 {
            let path = dir.path().join(format!("chunk_{}.ndjson", index));
            all.extend(ndjson_records(&path));
        }
        let ns: Vec<i64> = all.iter().map(|v| v["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn no_records_means_no_files() {
        let dir = TempDir::new().unwrap();
        let writer: ChunkWriter<Value, _> = ChunkWriter::new(dir.path(), 5, NdjsonFormat).unwrap();
        assert_eq!(writer.finish().unwrap(), 0);
        assert!(chunk_files(dir.path()).is_empty());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let dir = TempDir::new().unwrap();
        let result: Result<ChunkWriter<Value, _>> = ChunkWriter::new(dir.path(), 0, NdjsonFormat);
        assert!(result.is_err());
    }

    #[test]
    fn existing_chunk_is_never_overwritten() {
        let dir = TempDir::new().unwrap();

        let mut writer = ChunkWriter::new(dir.path(), 1, NdjsonFormat).unwrap();
        writer.push(json!({"run": 1})).unwrap();
        writer.finish().unwrap();

        let first = dir.path().join("chunk_1.ndjson");
        let original = fs::read_to_string(&first).unwrap();

        let mut writer = ChunkWriter::new(dir.path(), 1, NdjsonFormat).unwrap();
        writer.push(json!({"run": 2})).unwrap();
        writer.finish().unwrap();

        assert_eq!(fs::read_to_string(&first).unwrap(), original);
        let files = chunk_files(dir.path());
        assert_eq!(files.len(), 2);
        let suffixed = files
            .iter()
            .find(|p| p != &&first)
            .unwrap()
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(suffixed.starts_with("chunk_1_"));
        assert!(suffixed.ends_with(".ndjson"));
    }

    #[test]
    fn json_items_format_envelopes_records() {
        let dir = TempDir::new().unwrap();
        let mut writer = ChunkWriter::new(dir.path(), 2, JsonItemsFormat).unwrap();
        writer.push(json!({"DOI": "10.1/a"})).unwrap();
        writer.push(json!({"DOI": "10.1/b"})).unwrap();
        writer.finish().unwrap();

        let content = fs::read_to_string(dir.path().join("chunk_1.json")).unwrap();
        let value: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["items"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn gz_format_roundtrips_through_gzip() {
        let dir = TempDir::new().unwrap();
        let mut writer = ChunkWriter::new(dir.path(), 2, GzNdjsonFormat).unwrap();
        writer.push(json!({"n": 1})).unwrap();
        writer.push(json!({"n": 2})).unwrap();
        writer.finish().unwrap();

        let file = File::open(dir.path().join("chunk_1.gz")).unwrap();
        let mut decoder = GzDecoder::new(file);
        let mut content = String::new();
        decoder.read_to_string(&mut content).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn csv_format_repeats_header_per_chunk() {
        let dir = TempDir::new().unwrap();
        let format = CsvFormat::new(["pmid", "doi"]);
        let mut writer = ChunkWriter::new(dir.path(), 1, format).unwrap();
        writer
            .push(vec!["1284".to_string(), "10.1/a".to_string()])
            .unwrap();
        writer
            .push(vec!["1285".to_string(), "10.1/b".to_string()])
            .unwrap();
        writer.finish().unwrap();

        for index in 1..=2 {
            let content =
                fs::read_to_string(dir.path().join(format!("chunk_{}.csv", index))).unwrap();
            let mut lines = content.lines();
            assert_eq!(lines.next(), Some("pmid,doi"));
            assert_eq!(lines.count(), 1);
        }
    }
}
