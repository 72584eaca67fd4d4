//! Embedding-call metrics: cache hit rate, batches dispatched, retries.

use serde::{Deserialize, Serialize};

/// Cumulative counters over the life of the process. Cheap to update on
/// every `Facade::embed` call; `MetricsCollector::reset` zeroes them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddingMetrics {
    pub calls: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub batches_dispatched: u64,
    pub retried_indices: u64,
    pub partial_results: u64,
}

impl EmbeddingMetrics {
    pub fn record_call(&mut self, cache_hits: usize, cache_misses: usize, batches_dispatched: usize, retried_indices: usize) {
        self.calls += 1;
        self.cache_hits += cache_hits as u64;
        self.cache_misses += cache_misses as u64;
        self.batches_dispatched += batches_dispatched as u64;
        self.retried_indices += retried_indices as u64;
    }

    pub fn record_partial(&mut self) {
        self.partial_results += 1;
    }

    /// Cache hit rate over every probe this process has made.
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            return 1.0;
        }
        self.cache_hits as f64 / total as f64
    }
}
