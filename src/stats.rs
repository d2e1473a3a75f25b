/// Counters collected while processing one dump. Diagnostic only: counting
/// never changes which records are kept.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessStats {
    pub records_seen: u64,
    pub records_kept: u64,
    pub records_skipped: u64,
    pub malformed_lines: u64,
    pub chunks_written: u64,
    pub ids_resolved: u64,
    pub ids_rejected: u64,
}

impl ProcessStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_seen(&mut self) {
        self.records_seen += 1;
    }

    pub fn inc_kept(&mut self) {
        self.records_kept += 1;
    }

    pub fn inc_skipped(&mut self) {
        self.records_skipped += 1;
    }

    pub fn inc_malformed(&mut self) {
        self.malformed_lines += 1;
    }
}
