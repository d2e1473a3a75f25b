use crate::chunk::{ChunkWriter, JsonItemsFormat};
use crate::config::{ITEMS_KEY, PROGRESS_INTERVAL, READ_BUF_SIZE};
use crate::input::collect_files;
use crate::resolve::Resolver;
use crate::stats::ProcessStats;
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use serde_json::Value;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

/// Processes a Crossref dump: JSON files each holding a page of works under
/// `items`. A work survives when its DOI normalizes and at least one entry
/// of its `reference` list carries a resolvable DOI; surviving works are
/// re-enveloped under the same key in fixed-size chunks.
pub fn process(
    input: &Path,
    output_dir: &Path,
    interval: u64,
    resolver: &Resolver,
) -> Result<ProcessStats> {
    let files = collect_files(input, ".json")?;
    let mut writer: ChunkWriter<Value, _> =
        ChunkWriter::new(output_dir, interval, JsonItemsFormat)?;
    let mut stats = ProcessStats::new();
    let pb = ProgressBar::new_spinner();

    for file_path in &files {
        info!(file = ?file_path, "Processing Crossref file");
        let file = File::open(file_path)
            .with_context(|| format!("Failed to open input file: {:?}", file_path))?;
        let reader = BufReader::with_capacity(READ_BUF_SIZE, file);

        let mut page: Value = match serde_json::from_reader(reader) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, file = ?file_path, "Skipping malformed input file");
                stats.inc_malformed();
                continue;
            }
        };
        let Some(items) = page.get_mut(ITEMS_KEY).and_then(Value::as_array_mut) else {
            warn!(file = ?file_path, "Skipping input file without an items array");
            stats.inc_malformed();
            continue;
        };

        for item in items.iter_mut() {
            stats.inc_seen();
            if stats.records_seen % PROGRESS_INTERVAL == 0 {
                pb.tick();
            }
            match process_item(item.take(), resolver) {
                Some(processed) => {
                    writer.push(processed)?;
                    stats.inc_kept();
                }
                None => stats.inc_skipped(),
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
        "Crossref processing complete"
    );
    Ok(stats)
}

fn process_item(mut item: Value, resolver: &Resolver) -> Option<Value> {
    let doi_raw = item.get("DOI").and_then(Value::as_str)?.to_string();
    let doi = resolver
        .registry()
        .get("doi")?
        .normalise(&doi_raw, false)?;

    // references first: a work with no surviving citation is dropped before
    // any author or venue identifier is resolved
    let references = validated_references(item.get("reference"), resolver);
    if references.is_empty() {
        return None;
    }

    let obj = item.as_object_mut()?;
    obj.insert("DOI".to_string(), Value::String(doi));
    obj.insert("reference".to_string(), Value::Array(references));

    if let Some(authors) = obj.get_mut("author").and_then(Value::as_array_mut) {
        for author in authors.iter_mut() {
            resolve_author_orcid(author, resolver);
        }
    }

    if let Some(issns) = obj.get_mut("ISSN") {
        let validated = validated_issns(issns, resolver);
        *issns = Value::Array(validated);
    }

    Some(item)
}

/// Keeps references whose DOI resolves, rewriting the field to prefixed
/// canonical form. References without a DOI carry no linkable citation and
/// are dropped.
fn validated_references(references: Option<&Value>, resolver: &Resolver) -> Vec<Value> {
    let Some(entries) = references.and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut validated = Vec::new();
    for entry in entries {
        let Some(obj) = entry.as_object() else {
            continue;
        };
        let Some(doi_raw) = obj.get("DOI").and_then(Value::as_str) else {
            continue;
        };
        if let Some(normalized) = resolver.resolve(doi_raw, "doi") {
            let mut kept = obj.clone();
            kept.insert("DOI".to_string(), Value::String(normalized));
            validated.push(Value::Object(kept));
        }
    }
    validated
}

/// Rewrites the author's ORCID to canonical form in place, removing it when
/// it cannot be resolved.
fn resolve_author_orcid(author: &mut Value, resolver: &Resolver) {
    let Some(obj) = author.as_object_mut() else {
        return;
    };
    let Some(orcid_raw) = obj.get("ORCID").and_then(Value::as_str).map(String::from) else {
        return;
    };
    match resolver.resolve(&orcid_raw, "orcid") {
        Some(normalized) => {
            obj.insert("ORCID".to_string(), Value::String(normalized));
        }
        None => {
            obj.remove("ORCID");
        }
    }
}

fn validated_issns(issns: &Value, resolver: &Resolver) -> Vec<Value> {
    let entries: Vec<&str> = match issns {
        Value::Array(values) => values.iter().filter_map(Value::as_str).collect(),
        Value::String(single) => vec![single.as_str()],
        _ => Vec::new(),
    };
    entries
        .into_iter()
        .filter_map(|raw| resolver.resolve(raw, "issn"))
        .map(Value::String)
        .collect()
}
