use crate::chunk::{ChunkWriter, NdjsonFormat};
use crate::config::{PROGRESS_INTERVAL, READ_BUF_SIZE};
use crate::input::collect_files;
use crate::resolve::Resolver;
use crate::stats::ProcessStats;
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

/// Keys of a citation entry carried into the output alongside its DOI
const CITATION_KEYS: [&str; 3] = ["volume", "first_page", "publication_date"];

/// Processes a JaLC dump: one JSON file per record, the record under `data`.
/// The citing DOI must resolve and at least one `citation_list` entry must
/// carry a resolvable DOI; survivors are written as NDJSON chunks.
pub fn process(
    input: &Path,
    output_dir: &Path,
    interval: u64,
    resolver: &Resolver,
) -> Result<ProcessStats> {
    let files = collect_files(input, ".json")?;
    let mut writer: ChunkWriter<Value, _> = ChunkWriter::new(output_dir, interval, NdjsonFormat)?;
    let mut stats = ProcessStats::new();
    let pb = ProgressBar::new_spinner();

    for file_path in &files {
        let file = File::open(file_path)
            .with_context(|| format!("Failed to open input file: {:?}", file_path))?;
        let reader = BufReader::with_capacity(READ_BUF_SIZE, file);

        let record: Value = match serde_json::from_reader(reader) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, file = ?file_path, "Skipping malformed input file");
                stats.inc_malformed();
                continue;
            }
        };
        let Some(data) = record.get("data").and_then(Value::as_object) else {
            warn!(file = ?file_path, "Skipping input file without a data object");
            stats.inc_malformed();
            continue;
        };

        stats.inc_seen();
        if stats.records_seen % PROGRESS_INTERVAL == 0 {
            pb.tick();
        }
        match process_record(data, resolver) {
            Some(processed) => {
                writer.push(processed)?;
                stats.inc_kept();
            }
            None => stats.inc_skipped(),
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
        "JaLC processing complete"
    );
    Ok(stats)
}

fn process_record(data: &Map<String, Value>, resolver: &Resolver) -> Option<Value> {
    // the citing side goes through the full cache-then-authority check:
    // JaLC records cite by DOI only, so an unresolvable citing DOI makes
    // the whole record unlinkable
    let citing_raw = data.get("doi").and_then(Value::as_str)?;
    let citing = resolver.resolve(citing_raw, "doi")?;

    let citations = validated_citations(data.get("citation_list"), resolver);
    if citations.is_empty() {
        return None;
    }

    let mut out = data.clone();
    out.insert("doi".to_string(), Value::String(citing));
    out.insert("citation_list".to_string(), Value::Array(citations));

    if data.contains_key("journal_id_list") {
        let venue_ids = validated_venue_ids(data.get("journal_id_list"), resolver);
        out.insert(
            "journal_id_list".to_string(),
            Value::Array(venue_ids.into_iter().map(Value::String).collect()),
        );
    }

    Some(Value::Object(out))
}

/// Keeps citation entries with a resolvable DOI, projected onto the DOI plus
/// the allow-listed descriptive keys. Unstructured entries (plain-text
/// references with no DOI) are dropped.
fn validated_citations(citations: Option<&Value>, resolver: &Resolver) -> Vec<Value> {
    let Some(entries) = citations.and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut validated = Vec::new();
    for entry in entries {
        let Some(obj) = entry.as_object() else {
            continue;
        };
        let Some(doi_raw) = obj.get("doi").and_then(Value::as_str) else {
            continue;
        };
        let Some(normalized) = resolver.resolve(doi_raw, "doi") else {
            continue;
        };

        let mut kept = Map::new();
        kept.insert("doi".to_string(), Value::String(normalized));
        for key in CITATION_KEYS {
            if let Some(value) = obj.get(key) {
                kept.insert(key.to_string(), value.clone());
            }
        }
        validated.push(Value::Object(kept));
    }
    validated
}

/// Resolves the venue identifier list. JaLC lists ISSNs alongside its
/// proprietary JID scheme; only schemes the registry recognizes survive.
fn validated_venue_ids(venue_ids: Option<&Value>, resolver: &Resolver) -> Vec<String> {
    let Some(entries) = venue_ids.and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut validated = Vec::new();
    for entry in entries {
        let Some(obj) = entry.as_object() else {
            continue;
        };
        let Some(scheme) = obj.get("type").and_then(Value::as_str) else {
            continue;
        };
        let Some(raw) = obj.get("journal_id").and_then(Value::as_str) else {
            continue;
        };
        if let Some(normalized) = resolver.resolve(raw, scheme) {
            if !validated.contains(&normalized) {
                validated.push(normalized);
            }
        }
    }
    validated
}
