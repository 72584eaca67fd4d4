//! Actionable recommendations based on system health.

use serde::{Deserialize, Serialize};

use super::reporter::HealthSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub severity: Severity,
    pub message: String,
    pub action: String,
}

/// Generate recommendations from the current health snapshot.
pub fn generate(snapshot: &HealthSnapshot) -> Vec<Recommendation> {
    let mut recs = Vec::new();

    if snapshot.pool_degraded {
        recs.push(Recommendation {
            severity: Severity::Critical,
            message: "worker pool has exhausted replacement attempts".into(),
            action: "check worker binary logs, then restart the daemon".into(),
        });
    } else if snapshot.pool_worker_count < snapshot.pool_max_workers {
        recs.push(Recommendation {
            severity: Severity::Warning,
            message: format!(
                "running with {}/{} configured workers",
                snapshot.pool_worker_count, snapshot.pool_max_workers
            ),
            action: "check recent worker crashes in the log".into(),
        });
    }

    if snapshot.pool_queue_high_water > 0 {
        let occupancy = snapshot.pool_queue_depth as f64 / snapshot.pool_queue_high_water as f64;
        if occupancy > 0.80 {
            recs.push(Recommendation {
                severity: Severity::Warning,
                message: format!("request queue is {:.0}% full", occupancy * 100.0),
                action: "increase max_workers or queue_high_water".into(),
            });
        }
    }

    if snapshot.cache_capacity > 0 {
        let occupancy = snapshot.cache_len as f64 / snapshot.cache_capacity as f64;
        if occupancy > 0.90 {
            recs.push(Recommendation {
                severity: Severity::Warning,
                message: format!("embedding cache is {:.0}% full, eviction churn likely", occupancy * 100.0),
                action: "increase cache_capacity".into(),
            });
        }
    }

    if snapshot.cache_hit_rate < 0.30 {
        recs.push(Recommendation {
            severity: Severity::Warning,
            message: format!("embedding cache hit rate is {:.0}%", snapshot.cache_hit_rate * 100.0),
            action: "confirm clients are submitting stable, repeated text rather than unique content every call".into(),
        });
    }

    recs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degraded_pool_yields_a_critical_recommendation() {
        let snapshot = HealthSnapshot {
            pool_degraded: true,
            ..Default::default()
        };
        let recs = generate(&snapshot);
        assert!(recs.iter().any(|r| r.severity == Severity::Critical));
    }

    #[test]
    fn healthy_snapshot_yields_no_recommendations() {
        let snapshot = HealthSnapshot {
            pool_worker_count: 4,
            pool_max_workers: 4,
            pool_queue_depth: 0,
            pool_queue_high_water: 16,
            cache_len: 10,
            cache_capacity: 1000,
            cache_hit_rate: 0.9,
            ..Default::default()
        };
        assert!(generate(&snapshot).is_empty());
    }
}
