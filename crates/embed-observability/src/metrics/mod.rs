//! Central metrics registry.
//!
//! [`MetricsCollector`] owns all domain-specific metric collectors and
//! provides a unified interface for recording and querying metrics.

pub mod cache_metrics;
pub mod embedding_metrics;
pub mod pool_metrics;

pub use cache_metrics::CacheMetrics;
pub use embedding_metrics::EmbeddingMetrics;
pub use pool_metrics::PoolMetrics;

/// Central metrics registry that owns all domain-specific collectors.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MetricsCollector {
    pub embedding: EmbeddingMetrics,
    pub pool: PoolMetrics,
    pub cache: CacheMetrics,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all metrics (useful for testing or periodic rotation).
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
