use crate::chunk::{ChunkWriter, GzNdjsonFormat};
use crate::config::{PROGRESS_INTERVAL, READ_BUF_SIZE};
use crate::input::collect_files;
use crate::relations::{classify, RelationClass};
use crate::resolve::Resolver;
use crate::schemes::Registry;
use crate::stats::ProcessStats;
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use indicatif::ProgressBar;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

/// Processes an OpenAIRE relation dump: gzip-compressed JSON lines, one
/// source-to-target relation per line. Only `Cites` relations where both
/// ends keep at least one resolvable identifier survive; identifier lists
/// are rewritten to normalized form and chunks are written back as `.gz`.
pub fn process(
    input: &Path,
    output_dir: &Path,
    interval: u64,
    resolver: &Resolver,
) -> Result<ProcessStats> {
    let files = collect_files(input, ".gz")?;
    let mut writer: ChunkWriter<Value, _> =
        ChunkWriter::new(output_dir, interval, GzNdjsonFormat)?;
    let mut stats = ProcessStats::new();
    let pb = ProgressBar::new_spinner();

    for file_path in &files {
        info!(file = ?file_path, "Processing OpenAIRE part file");
        let file = File::open(file_path)
            .with_context(|| format!("Failed to open input file: {:?}", file_path))?;
        let reader = BufReader::with_capacity(READ_BUF_SIZE, GzDecoder::new(file));

        for line in reader.lines() {
            let line =
                line.with_context(|| format!("Failed to read input file: {:?}", file_path))?;
            if line.trim().is_empty() {
                continue;
            }
            stats.inc_seen();
            if stats.records_seen % PROGRESS_INTERVAL == 0 {
                pb.tick();
            }
            let record: Value = match serde_json::from_str(&line) {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "Skipping malformed input line");
                    stats.inc_malformed();
                    continue;
                }
            };
            match process_relation(record, resolver) {
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
        "OpenAIRE processing complete"
    );
    Ok(stats)
}

fn process_relation(mut record: Value, resolver: &Resolver) -> Option<Value> {
    let name = record
        .get("relationship")
        .and_then(|r| r.get("name"))
        .and_then(Value::as_str)?;
    // the dump spells the direction out per record; only the citing
    // direction is kept, its inverse is redundant
    if classify(name, "") != RelationClass::Cites {
        return None;
    }

    // the source side is resolved first so an unlinkable citing record
    // skips the target's authority checks entirely
    let source_ids = resolved_end(record.get("source"), resolver);
    if source_ids.is_empty() {
        return None;
    }
    let target_ids = resolved_end(record.get("target"), resolver);
    if target_ids.is_empty() {
        return None;
    }

    set_identifiers(record.get_mut("source"), source_ids);
    set_identifiers(record.get_mut("target"), target_ids);
    Some(record)
}

/// Resolves one end's identifier list against the citation-target schemes,
/// deduplicated in insertion order.
fn resolved_end(end: Option<&Value>, resolver: &Resolver) -> Vec<String> {
    let Some(entries) = end
        .and_then(|e| e.get("identifier"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    let mut resolved = Vec::new();
    for entry in entries {
        let Some(scheme) = entry.get("schema").and_then(Value::as_str) else {
            continue;
        };
        if !Registry::is_citation_scheme(scheme) {
            continue;
        }
        let Some(raw) = entry.get("identifier").and_then(Value::as_str) else {
            continue;
        };
        if let Some(normalized) = resolver.resolve(raw, scheme) {
            if !resolved.contains(&normalized) {
                resolved.push(normalized);
            }
        }
    }
    resolved
}

fn set_identifiers(end: Option<&mut Value>, ids: Vec<String>) {
    if let Some(obj) = end.and_then(Value::as_object_mut) {
        obj.insert(
            "identifier".to_string(),
            Value::Array(ids.into_iter().map(Value::String).collect()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use serde_json::json;

    fn relation(name: &str, source_ids: Value, target_ids: Value) -> Value {
        json!({
            "relationship": {"name": name, "schema": "datacite"},
            "source": {"objectType": "publication", "identifier": source_ids},
            "target": {"objectType": "publication", "identifier": target_ids}
        })
    }

    #[test]
    fn non_cites_relations_are_dropped() {
        let registry = Registry::new();
        let cache = MemoryCache::new();
        let resolver = Resolver::new(&registry, &cache);

        let record = relation(
            "IsCitedBy",
            json!([{"identifier": "PMID:1284", "schema": "pmid"}]),
            json!([{"identifier": "10.1002/em.21799", "schema": "doi"}]),
        );
        assert!(process_relation(record, &resolver).is_none());
    }

    #[test]
    fn both_ends_must_resolve() {
        let registry = Registry::new();
        let cache = MemoryCache::new();
        let resolver = Resolver::new(&registry, &cache);

        // source only carries an agent-scheme identifier: not a citation end
        let record = relation(
            "Cites",
            json!([{"identifier": "https://ror.org/02mhbdp94", "schema": "ror"}]),
            json!([{"identifier": "10.1002/em.21799", "schema": "doi"}]),
        );
        assert!(process_relation(record, &resolver).is_none());
    }

    #[test]
    fn identifier_lists_are_rewritten_to_normalized_form() {
        let registry = Registry::new();
        let cache = MemoryCache::new();
        let resolver = Resolver::new(&registry, &cache);

        let record = relation(
            "Cites",
            json!([
                {"identifier": "PMID:1284", "schema": "pmid"},
                {"identifier": "DOI:10.1016/0531-5565(75)90003-0", "schema": "doi"},
                {"identifier": "2151-6065", "schema": "ISSN"}
            ]),
            json!([{"identifier": "10.1002/em.21799", "schema": "DOI"}]),
        );
        let processed = process_relation(record, &resolver).unwrap();
        assert_eq!(
            processed["source"]["identifier"],
            json!(["pmid:1284", "doi:10.1016/0531-5565(75)90003-0"])
        );
        assert_eq!(processed["target"]["identifier"], json!(["doi:10.1002/em.21799"]));
        // untouched descriptive fields survive
        assert_eq!(processed["source"]["objectType"], "publication");
    }
}
