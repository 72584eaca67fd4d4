//! [`ObservabilityEngine`] — owns health, metrics, degradation, and call
//! log subsystems.

use embed_core::errors::EmbedResult;
use embed_core::DegradationEvent;

use crate::call_log::{CallLog, CallLogEntry};
use crate::degradation::{evaluate_alerts, DegradationAlert, DegradationTracker};
use crate::health::{HealthChecker, HealthReport, HealthSnapshot, Recommendation};
use crate::metrics::MetricsCollector;

/// Central observability engine that orchestrates all subsystems. Owned
/// by the daemon binary alongside the facade, pool, and registry.
#[derive(Debug)]
pub struct ObservabilityEngine {
    pub health: HealthChecker,
    pub metrics: MetricsCollector,
    pub degradation: DegradationTracker,
    pub call_log: CallLog,
}

impl ObservabilityEngine {
    pub fn new() -> Self {
        Self {
            health: HealthChecker::new(),
            metrics: MetricsCollector::new(),
            degradation: DegradationTracker::new(),
            call_log: CallLog::new(),
        }
    }

    /// Update the health snapshot, feed it into the metrics collectors,
    /// and generate a report.
    pub fn health_report(&mut self, snapshot: HealthSnapshot) -> EmbedResult<HealthReport> {
        self.metrics.pool.observe(&embed_pool::PoolHealth {
            worker_count: snapshot.pool_worker_count,
            degraded: snapshot.pool_degraded,
            queue_depth: snapshot.pool_queue_depth,
            queue_high_water: snapshot.pool_queue_high_water,
        });
        self.metrics.cache.observe(snapshot.cache_len, snapshot.cache_capacity);
        self.health.set_snapshot(snapshot);
        self.health.report()
    }

    pub fn recommendations(&self) -> Vec<Recommendation> {
        self.health.recommendations()
    }

    pub fn record_call(&mut self, entry: CallLogEntry) {
        self.metrics.embedding.record_call(
            entry.cache_hits,
            entry.cache_misses,
            entry.batches_dispatched,
            entry.retried_indices,
        );
        if !entry.succeeded {
            self.metrics.embedding.record_partial();
        }
        self.call_log.record(entry);
    }

    pub fn record_degradation(&mut self, event: DegradationEvent) {
        self.degradation.record(event);
    }

    pub fn record_degradations(&mut self, events: Vec<DegradationEvent>) {
        self.degradation.record_all(events);
    }

    pub fn mark_recovered(&mut self, component: &str) {
        self.degradation.mark_recovered(component);
    }

    pub fn degradation_alerts(&self) -> Vec<DegradationAlert> {
        evaluate_alerts(&self.degradation)
    }

    pub fn reset_metrics(&mut self) {
        self.metrics.reset();
    }

    /// Serialize current metrics and call log state to JSON, for the
    /// `/status` endpoint.
    pub fn metrics_snapshot(&self) -> EmbedResult<serde_json::Value> {
        let metrics_json = serde_json::to_value(&self.metrics)
            .map_err(|e| embed_core::errors::EmbedError::internal(format!("serializing metrics: {e}")))?;
        let call_count = self.call_log.count();
        let avg_latency_ms = self.call_log.avg_latency().as_millis() as u64;

        Ok(serde_json::json!({
            "metrics": metrics_json,
            "call_log_count": call_count,
            "call_avg_latency_ms": avg_latency_ms,
        }))
    }
}

impl Default for ObservabilityEngine {
    fn default() -> Self {
        Self::new()
    }
}
