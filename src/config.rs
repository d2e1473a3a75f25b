/// Version stamp for validation-cache snapshots; bump on layout changes
pub const CACHE_VERSION: u32 = 1;

/// Progress update interval (tick every N records)
pub const PROGRESS_INTERVAL: u64 = 1000;

/// Buffer size for chunk file writers
pub const WRITE_BUF_SIZE: usize = 128 * 1024;

/// Buffer size for input readers
pub const READ_BUF_SIZE: usize = 256 * 1024;

/// Envelope key for Crossref-style chunk files
pub const ITEMS_KEY: &str = "items";

/// Columns kept by the iCite adapter, in output order
pub const ICITE_COLUMNS: [&str; 8] = [
    "pmid",
    "doi",
    "title",
    "authors",
    "year",
    "journal",
    "cited_by",
    "references",
];
