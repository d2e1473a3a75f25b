use crate::cache::ValidationCache;
use crate::schemes::Registry;
use std::cell::Cell;

/// Resolves raw identifiers into validated canonical form.
///
/// Resolution is normalise, then cache, then authority. A cache hit returns
/// without invoking `is_valid`: the cache holds identifiers already confirmed
/// by a prior authoritative process, so repeating the check is wasted work.
/// Failures at any step return `None` with no logging; invalid and
/// unrecognized identifiers are simply omitted from the output.
pub struct Resolver<'a> {
    registry: &'a Registry,
    cache: &'a dyn ValidationCache,
    resolved: Cell<u64>,
    rejected: Cell<u64>,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a Registry, cache: &'a dyn ValidationCache) -> Self {
        Self {
            registry,
            cache,
            resolved: Cell::new(0),
            rejected: Cell::new(0),
        }
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    /// Identifiers accepted so far. Diagnostic only; counting never changes
    /// accept/reject outcomes.
    pub fn ids_resolved(&self) -> u64 {
        self.resolved.get()
    }

    /// Identifiers of recognized schemes rejected so far (malformed or
    /// invalid). Unrecognized schemes are not counted.
    pub fn ids_rejected(&self) -> u64 {
        self.rejected.get()
    }

    /// Returns the prefixed canonical identifier, or `None` when the scheme
    /// is unrecognized, the value malformed, or the identifier invalid.
    pub fn resolve(&self, raw_value: &str, scheme: &str) -> Option<String> {
        let manager = self.registry.get(scheme)?;
        let Some(normalized) = manager.normalise(raw_value, true) else {
            self.rejected.set(self.rejected.get() + 1);
            return None;
        };
        if self.cache.contains(&normalized) {
            self.resolved.set(self.resolved.get() + 1);
            return Some(normalized);
        }
        if manager.is_valid(&normalized) {
            self.resolved.set(self.resolved.get() + 1);
            Some(normalized)
        } else {
            self.rejected.set(self.rejected.get() + 1);
            None
        }
    }

    /// Like `resolve`, but skips validation entirely. Used where the source
    /// guarantees only well-formedness matters (e.g. a record's own primary
    /// identifier).
    pub fn normalise_only(&self, raw_value: &str, scheme: &str) -> Option<String> {
        let manager = self.registry.get(scheme)?;
        manager.normalise(raw_value, true)
    }
}
