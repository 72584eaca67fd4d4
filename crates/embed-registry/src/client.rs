//! ClientSession — the record the registry keeps per connected client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A connected client, tracked for idle/no-clients shutdown accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSession {
    pub client_id: String,
    pub project_key: String,
    pub pid: Option<u32>,
    pub registered_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl ClientSession {
    pub fn new(client_id: String, project_key: String, pid: Option<u32>) -> Self {
        let now = Utc::now();
        Self {
            client_id,
            project_key,
            pid,
            registered_at: now,
            last_activity: now,
        }
    }

    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.last_activity {
            self.last_activity = now;
        }
    }

    pub fn idle_for(&self) -> chrono::Duration {
        Utc::now() - self.last_activity
    }
}
