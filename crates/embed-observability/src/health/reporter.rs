//! Aggregate health report generation.

use embed_core::errors::EmbedResult;
use serde::{Deserialize, Serialize};

use super::recommendations::Recommendation;
use super::subsystem_checks::SubsystemChecker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsystemHealth {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub overall_status: HealthStatus,
    pub subsystems: Vec<SubsystemHealth>,
    pub uptime_ms: u64,
    pub pool_ready: bool,
}

/// Snapshot of subsystem data used to build a health report. Populated
/// from `embed_pool::PoolHealth`, `embed_cache::Cache`, and
/// `embed_registry::ClientRegistry` by whoever owns the process (the
/// daemon binary, or `embed-server`'s `/status` handler).
#[derive(Debug, Clone, Default)]
pub struct HealthSnapshot {
    pub pool_worker_count: usize,
    pub pool_max_workers: usize,
    pub pool_degraded: bool,
    pub pool_queue_depth: usize,
    pub pool_queue_high_water: usize,
    pub cache_len: usize,
    pub cache_capacity: usize,
    pub cache_hit_rate: f64,
    pub registry_client_count: usize,
    pub uptime_ms: u64,
}

/// Builds a [`HealthReport`] from a snapshot and subsystem checks.
pub struct HealthReporter;

impl HealthReporter {
    pub fn build(snapshot: &HealthSnapshot) -> EmbedResult<HealthReport> {
        let subsystems = SubsystemChecker::check_all(snapshot);
        let overall_status = Self::derive_overall(&subsystems);
        let pool_ready = snapshot.pool_worker_count > 0 && !snapshot.pool_degraded;

        Ok(HealthReport {
            overall_status,
            subsystems,
            uptime_ms: snapshot.uptime_ms,
            pool_ready,
        })
    }

    pub fn recommendations(snapshot: &HealthSnapshot) -> Vec<Recommendation> {
        super::recommendations::generate(snapshot)
    }

    fn derive_overall(subsystems: &[SubsystemHealth]) -> HealthStatus {
        let mut worst = HealthStatus::Healthy;
        for s in subsystems {
            match s.status {
                HealthStatus::Unhealthy => return HealthStatus::Unhealthy,
                HealthStatus::Degraded => worst = HealthStatus::Degraded,
                HealthStatus::Healthy => {}
            }
        }
        worst
    }
}
