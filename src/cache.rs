use crate::config::CACHE_VERSION;
use anyhow::{Context, Result};
use bincode::Options;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter};
use std::path::Path;
use tracing::{info, warn};

/// Existence check for normalized identifiers already confirmed valid by a
/// prior authoritative process.
///
/// Presence is proof of validity and short-circuits the per-scheme authority
/// check; absence means nothing. The pipeline never writes to the cache.
pub trait ValidationCache {
    fn contains(&self, normalized: &str) -> bool;
}

/// In-memory identifier set, loaded from a snapshot file or built by tests.
#[derive(Default)]
pub struct MemoryCache {
    known: FxHashSet<String>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks an identifier as known-good. Population is an external concern;
    /// the processing pipeline itself never calls this.
    pub fn insert(&mut self, normalized: impl Into<String>) {
        self.known.insert(normalized.into());
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

impl ValidationCache for MemoryCache {
    fn contains(&self, normalized: &str) -> bool {
        self.known.contains(normalized)
    }
}

#[derive(Serialize, Deserialize)]
struct SnapshotMetadata {
    version: u32,
    id_count: usize,
}

#[derive(Deserialize)]
struct SnapshotDe {
    metadata: SnapshotMetadata,
    known: FxHashSet<String>,
}

/// Borrows the identifier set to avoid cloning it during serialization.
#[derive(Serialize)]
struct SnapshotSer<'a> {
    metadata: SnapshotMetadata,
    known: &'a FxHashSet<String>,
}

/// Loads a snapshot into a `MemoryCache`.
///
/// A corrupt or version-mismatched snapshot degrades to an empty cache with a
/// warning: every lookup then falls through to the authority check, which is
/// slower but never wrong. A missing file is an error, since the operator
/// named it explicitly.
pub fn load_snapshot(path: &Path) -> Result<MemoryCache> {
    let file_size = fs::metadata(path)
        .with_context(|| format!("Failed to stat cache snapshot: {:?}", path))?
        .len();

    let file =
        File::open(path).with_context(|| format!("Failed to open cache snapshot: {:?}", path))?;
    let reader = BufReader::with_capacity(256 * 1024, file);

    let options = bincode::options().with_limit(file_size.saturating_add(1024));

    let snapshot: SnapshotDe = match options.deserialize_from(reader) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, path = ?path, "Cache snapshot is corrupt or unreadable");
            return Ok(MemoryCache::new());
        }
    };

    if snapshot.metadata.version != CACHE_VERSION {
        warn!(
            cached = snapshot.metadata.version,
            current = CACHE_VERSION,
            "Cache snapshot version mismatch"
        );
        return Ok(MemoryCache::new());
    }

    info!(ids = snapshot.metadata.id_count, "Validation cache loaded");

    Ok(MemoryCache {
        known: snapshot.known,
    })
}

/// Serializes the identifier set by reference and writes atomically via rename.
pub fn save_snapshot(cache: &MemoryCache, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
    }

    let snapshot = SnapshotSer {
        metadata: SnapshotMetadata {
            version: CACHE_VERSION,
            id_count: cache.known.len(),
        },
        known: &cache.known,
    };

    let tmp_path = path.with_extension("bin.tmp");
    let file = File::create(&tmp_path)
        .with_context(|| format!("Failed to create temp snapshot file: {:?}", tmp_path))?;
    let writer = BufWriter::new(file);

    bincode::DefaultOptions::new()
        .serialize_into(writer, &snapshot)
        .context("Failed to serialize cache snapshot")?;

    fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to rename temp snapshot file to: {:?}", path))?;

    info!(ids = cache.known.len(), path = ?path, "Validation cache saved");

    Ok(())
}

/// Builds a snapshot from a newline-delimited list of normalized identifiers.
/// Blank lines and `#` comments are skipped.
pub fn build_snapshot(input_path: &Path, output_path: &Path) -> Result<usize> {
    let file = File::open(input_path)
        .with_context(|| format!("Failed to open identifier list: {:?}", input_path))?;
    let reader = BufReader::new(file);

    let mut cache = MemoryCache::new();
    for line in reader.lines() {
        let line = line.context("Failed to read identifier list")?;
        let id = line.trim();
        if id.is_empty() || id.starts_with('#') {
            continue;
        }
        cache.insert(id);
    }

    let count = cache.len();
    save_snapshot(&cache, output_path)?;
    Ok(count)
}
