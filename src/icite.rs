use crate::chunk::{ChunkWriter, CsvFormat};
use crate::config::{ICITE_COLUMNS, PROGRESS_INTERVAL, READ_BUF_SIZE};
use crate::input::collect_files;
use crate::resolve::Resolver;
use crate::stats::ProcessStats;
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

/// Processes an NIH iCite metadata dump: CSV files, one publication per row.
/// Rows are projected onto the column allow-list and kept only when they
/// carry inbound (`cited_by`) or outbound (`references`) citation links; the
/// primary `pmid` is rewritten to canonical digits.
pub fn process(
    input: &Path,
    output_dir: &Path,
    interval: u64,
    resolver: &Resolver,
) -> Result<ProcessStats> {
    let files = collect_files(input, ".csv")?;
    let format = CsvFormat::new(ICITE_COLUMNS);
    let mut writer: ChunkWriter<Vec<String>, _> = ChunkWriter::new(output_dir, interval, format)?;
    let mut stats = ProcessStats::new();
    let pb = ProgressBar::new_spinner();

    for file_path in &files {
        info!(file = ?file_path, "Processing iCite file");
        let file = File::open(file_path)
            .with_context(|| format!("Failed to open input file: {:?}", file_path))?;
        let mut reader = csv::Reader::from_reader(BufReader::with_capacity(READ_BUF_SIZE, file));

        let headers = reader
            .headers()
            .with_context(|| format!("Failed to read CSV header: {:?}", file_path))?
            .clone();
        let indices: Vec<Option<usize>> = ICITE_COLUMNS
            .iter()
            .map(|name| headers.iter().position(|h| h == *name))
            .collect();

        for record in reader.records() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "Skipping malformed CSV row");
                    stats.inc_malformed();
                    continue;
                }
            };
            stats.inc_seen();
            if stats.records_seen % PROGRESS_INTERVAL == 0 {
                pb.tick();
            }

            let mut row: Vec<String> = indices
                .iter()
                .map(|idx| {
                    idx.and_then(|i| record.get(i))
                        .unwrap_or_default()
                        .to_string()
                })
                .collect();

            // cited_by and references are the last two allow-listed columns
            let has_citations = row[ICITE_COLUMNS.len() - 2..]
                .iter()
                .any(|v| !v.trim().is_empty());
            if !has_citations {
                stats.inc_skipped();
                continue;
            }

            if let Some(normalized) = resolver
                .registry()
                .get("pmid")
                .and_then(|m| m.normalise(&row[0], false))
            {
                row[0] = normalized;
            }

            writer.push(row)?;
            stats.inc_kept();
        }
    }

    pb.finish_and_clear();
    stats.chunks_written = writer.finish()?;
    stats.ids_resolved = resolver.ids_resolved();
    stats.ids_rejected = resolver.ids_rejected();

    info!(
        seen = stats.records_seen,
        kept = stats.records_kept,
        chunks = stats.chunks_written,
        "iCite processing complete"
    );
    Ok(stats)
}
