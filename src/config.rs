//! Engine configuration.

use std::thread;

/// Default bound on the number of visible duplicate groups.
pub const DEFAULT_MAX_GROUPS: usize = 50;

/// Tuning knobs for the indexing engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum number of duplicate groups the view reports. Also feeds the
    /// scheduler's minimum-size cutoff.
    pub max_groups: usize,
    /// Maximum number of concurrent background hashes.
    pub concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_groups: DEFAULT_MAX_GROUPS,
            concurrency: default_concurrency(),
        }
    }
}

impl EngineConfig {
    /// Clamp nonsensical values to workable minimums.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.max_groups = self.max_groups.max(1);
        self.concurrency = self.concurrency.max(1);
        self
    }
}

/// One hashing worker per processing unit, minus one to keep the event
/// loop and walkers responsive. Never below one.
#[must_use]
pub fn default_concurrency() -> usize {
    thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}
