//! Per-subsystem health checks: worker pool, cache, client registry.
//! Each returns healthy | degraded | unhealthy.

use super::reporter::{HealthSnapshot, HealthStatus, SubsystemHealth};

/// Runs health checks against each subsystem.
pub struct SubsystemChecker;

impl SubsystemChecker {
    pub fn check_all(snapshot: &HealthSnapshot) -> Vec<SubsystemHealth> {
        vec![
            Self::check_pool(snapshot),
            Self::check_cache(snapshot),
            Self::check_registry(snapshot),
        ]
    }

    /// Pool: unhealthy once the pool has declared itself degraded
    /// (replacement attempts exhausted), degraded if the queue is past
    /// 80% of its high-water mark or a worker slot is currently unfilled.
    fn check_pool(snapshot: &HealthSnapshot) -> SubsystemHealth {
        let (status, message) = if snapshot.pool_degraded {
            (HealthStatus::Unhealthy, Some("worker pool has exhausted replacement attempts".into()))
        } else if snapshot.pool_queue_high_water > 0
            && snapshot.pool_queue_depth * 100 / snapshot.pool_queue_high_water > 80
        {
            (
                HealthStatus::Degraded,
                Some(format!(
                    "queue at {}/{} of high-water mark",
                    snapshot.pool_queue_depth, snapshot.pool_queue_high_water
                )),
            )
        } else if snapshot.pool_worker_count < snapshot.pool_max_workers {
            (
                HealthStatus::Degraded,
                Some(format!(
                    "{}/{} workers running",
                    snapshot.pool_worker_count, snapshot.pool_max_workers
                )),
            )
        } else {
            (HealthStatus::Healthy, None)
        };
        SubsystemHealth {
            name: "pool".into(),
            status,
            message,
        }
    }

    /// Cache: degraded if hit rate is below 30%, unhealthy if the shard
    /// is essentially full (churning on every insert).
    fn check_cache(snapshot: &HealthSnapshot) -> SubsystemHealth {
        let occupancy = if snapshot.cache_capacity == 0 {
            0.0
        } else {
            snapshot.cache_len as f64 / snapshot.cache_capacity as f64
        };
        let (status, message) = if occupancy > 0.98 {
            (HealthStatus::Unhealthy, Some("cache at capacity, every insert evicts".into()))
        } else if snapshot.cache_hit_rate < 0.30 {
            (
                HealthStatus::Degraded,
                Some(format!("cache hit rate is {:.0}%", snapshot.cache_hit_rate * 100.0)),
            )
        } else {
            (HealthStatus::Healthy, None)
        };
        SubsystemHealth {
            name: "cache".into(),
            status,
            message,
        }
    }

    /// Registry: informational only; client count never affects health.
    fn check_registry(snapshot: &HealthSnapshot) -> SubsystemHealth {
        SubsystemHealth {
            name: "registry".into(),
            status: HealthStatus::Healthy,
            message: Some(format!("{} clients connected", snapshot.registry_client_count)),
        }
    }
}
