//! Worker pool metrics, derived from `embed_pool::PoolHealth` snapshots.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolMetrics {
    pub last_worker_count: usize,
    pub last_queue_depth: usize,
    pub last_queue_high_water: usize,
    pub degraded_observations: u64,
    pub samples: u64,
}

impl PoolMetrics {
    pub fn observe(&mut self, health: &embed_pool::PoolHealth) {
        self.last_worker_count = health.worker_count;
        self.last_queue_depth = health.queue_depth;
        self.last_queue_high_water = health.queue_high_water;
        self.samples += 1;
        if health.degraded {
            self.degraded_observations += 1;
        }
    }

    pub fn queue_occupancy(&self) -> f64 {
        if self.last_queue_high_water == 0 {
            return 0.0;
        }
        self.last_queue_depth as f64 / self.last_queue_high_water as f64
    }
}
