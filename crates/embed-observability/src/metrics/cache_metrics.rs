//! On-disk cache occupancy metrics.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheMetrics {
    pub last_len: usize,
    pub last_capacity: usize,
    pub samples: u64,
}

impl CacheMetrics {
    pub fn observe(&mut self, len: usize, capacity: usize) {
        self.last_len = len;
        self.last_capacity = capacity;
        self.samples += 1;
    }

    pub fn occupancy(&self) -> f64 {
        if self.last_capacity == 0 {
            return 0.0;
        }
        self.last_len as f64 / self.last_capacity as f64
    }
}
