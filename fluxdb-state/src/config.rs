// Copyright (c) 2023 MASSA LABS <info@massa.net>

use serde::Deserialize;

/// Engine configuration.
///
/// The index thresholds are load-shedding knobs: they bound how often
/// snapshot builds run inline with the flushing batch. Defaults are the
/// production values.
#[derive(Debug, Clone, Deserialize)]
pub struct StateConfig {
    /// Minimum row mutations on a tablet before a snapshot is considered.
    pub index_mutation_threshold: u64,
    /// Map size above which a tablet is considered large.
    pub index_large_map_size: usize,
    /// Mutation threshold applied to large tablets.
    pub index_large_map_threshold: u64,
    /// Map size above which a tablet is considered medium.
    pub index_medium_map_size: usize,
    /// Mutation threshold applied to medium tablets.
    pub index_medium_map_threshold: u64,
    /// Serialized snapshot size above which a warning is surfaced.
    pub index_heavy_bytes: usize,
    /// Approximate batch size that triggers an intermediate flush during
    /// index catch-up.
    pub max_batch_bytes: usize,
}

impl Default for StateConfig {
    fn default() -> Self {
        StateConfig {
            index_mutation_threshold: 1_000,
            index_large_map_size: 100_000,
            index_large_map_threshold: 10_000,
            index_medium_map_size: 50_000,
            index_medium_map_threshold: 5_000,
            index_heavy_bytes: 25_000_000,
            max_batch_bytes: 64 * 1024 * 1024,
        }
    }
}
