use crate::assemble::assemble;
use crate::chunk::{ChunkWriter, NdjsonFormat};
use crate::config::{PROGRESS_INTERVAL, READ_BUF_SIZE};
use crate::input::collect_files;
use crate::models::ProcessedEntity;
use crate::resolve::Resolver;
use crate::stats::ProcessStats;
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

/// Processes a DataCite dump: newline-delimited JSON where every line is an
/// envelope holding a page of entities under `data`. Entities not involved
/// in any citation are discarded; survivors are written as NDJSON chunks.
pub fn process(
    input: &Path,
    output_dir: &Path,
    interval: u64,
    resolver: &Resolver,
) -> Result<ProcessStats> {
    let files = collect_files(input, ".ndjson")?;
    let mut writer: ChunkWriter<ProcessedEntity, _> =
        ChunkWriter::new(output_dir, interval, NdjsonFormat)?;
    let mut stats = ProcessStats::new();
    let pb = ProgressBar::new_spinner();

    for file_path in &files {
        info!(file = ?file_path, "Processing DataCite file");
        let file = File::open(file_path)
            .with_context(|| format!("Failed to open input file: {:?}", file_path))?;
        let reader = BufReader::with_capacity(READ_BUF_SIZE, file);

        for line in reader.lines() {
            let line =
                line.with_context(|| format!("Failed to read input file: {:?}", file_path))?;
            if line.trim().is_empty() {
                continue;
            }
            let envelope: Value = match serde_json::from_str(&line) {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "Skipping malformed input line");
                    stats.inc_malformed();
                    continue;
                }
            };
            let Some(entities) = envelope.get("data").and_then(Value::as_array) else {
                warn!("Skipping input line without a data array");
                stats.inc_malformed();
                continue;
            };

            for entity in entities {
                stats.inc_seen();
                if stats.records_seen % PROGRESS_INTERVAL == 0 {
                    pb.tick();
                }
                match process_entity(entity, resolver) {
                    Some(processed) => {
                        writer.push(processed)?;
                        stats.inc_kept();
                    }
                    None => stats.inc_skipped(),
                }
            }
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
        "DataCite processing complete"
    );
    Ok(stats)
}

fn process_entity(entity: &Value, resolver: &Resolver) -> Option<ProcessedEntity> {
    let id = entity.get("id").and_then(Value::as_str)?;
    if entity.get("type").and_then(Value::as_str) != Some("dois") {
        return None;
    }
    // the primary DOI is normalized but not validated: the provider minted
    // it, so existence is not in question
    let doi = resolver.normalise_only(id, "doi")?;
    let attributes = entity.get("attributes").and_then(Value::as_object)?;
    assemble(doi, attributes, resolver)
}
