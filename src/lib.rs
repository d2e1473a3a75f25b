//! Citesieve: citation-only extracts from bibliographic metadata dumps
//!
//! This crate filters large metadata dumps from multiple providers
//! (Crossref, DataCite, JaLC, OpenAIRE, NIH iCite) down to the records that
//! participate in citations, and splits the survivors into fixed-size
//! output chunks:
//!
//! 1. **Resolution** -- Every identifier is normalized into a canonical
//!    scheme-prefixed form and checked against a two-tier authority: a fast
//!    existence cache first, the per-scheme validity check only on a miss
//! 2. **Filtering** -- A record survives only when at least one citation
//!    link resolves; records without citations are dropped before any of
//!    their other identifiers are resolved
//! 3. **Chunking** -- Survivors are buffered and flushed into numbered
//!    files of exactly `interval` records, plus one undersized remainder
//!    chunk at end-of-stream
//!
//! # Architecture
//!
//! The pipeline is single-threaded and strictly sequential: one input
//! stream, record by record, output order matching input order. The five
//! provider adapters differ only in dump parsing; the resolution protocol
//! and the chunk allocator are shared.
//!
//! - **Cache precedence** -- A cache hit is proof of validity and skips the
//!   authority check entirely; negative results are never cached
//! - **Silent discard** -- Unrecognized schemes and invalid identifiers are
//!   omitted without errors or hot-path logging
//! - **Collision-safe output** -- An existing chunk file is never
//!   overwritten; re-runs fall back to timestamp-suffixed names
//!
//! # Key Modules
//!
//! - [`schemes`] -- Per-scheme normalization/validity managers and registry
//! - [`cache`] -- Validation cache trait, in-memory set, snapshot files
//! - [`resolve`] -- Cache-then-authority identifier resolution
//! - [`relations`] -- Provider relation vocabularies folded into canonical classes
//! - [`assemble`] -- Candidate entity to processed entity (DataCite shape)
//! - [`chunk`] -- Fixed-size chunk allocator with pluggable formats
//! - [`models`] -- Core data types (ProcessedEntity, RelationBuckets)
//! - [`datacite`], [`crossref`], [`jalc`], [`openaire`], [`icite`] -- Source adapters
//! - [`input`] -- Deterministic input file discovery
//! - [`stats`] -- Per-run diagnostic counters
//! - [`config`] -- Constants for processing and output
//!
//! # Example Usage
//!
//! ```bash
//! # Split a DataCite dump into chunks of 10000 citation-bearing entities
//! citesieve process --source datacite -i dump/ -o out/ -n 10000
//!
//! # Same run, consulting a prebuilt validation cache
//! citesieve process --source datacite -i dump/ -o out/ -n 10000 --cache known.bin
//!
//! # Build a validation cache snapshot from a list of known identifiers
//! citesieve build-cache -i known_ids.txt -o known.bin
//! ```

pub mod assemble;
pub mod cache;
pub mod chunk;
pub mod config;
pub mod crossref;
pub mod datacite;
pub mod icite;
pub mod input;
pub mod jalc;
pub mod models;
pub mod openaire;
pub mod relations;
pub mod resolve;
pub mod schemes;
pub mod stats;
