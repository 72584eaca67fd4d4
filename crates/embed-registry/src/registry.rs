//! ClientRegistry — concurrent per-client tracking via DashMap.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::client::ClientSession;

/// Outcome of a `register` call, distinguishing a fresh registration from
/// a re-registration of an id the registry already knew about.
#[derive(Debug, Clone)]
pub struct RegisterOutcome {
    pub client_id: String,
    pub registered_at: DateTime<Utc>,
    pub total_clients: usize,
}

/// Outcome of a `deregister` call.
#[derive(Debug, Clone)]
pub struct DeregisterOutcome {
    pub client_id: String,
    pub was_registered: bool,
    pub total_clients: usize,
}

/// Thread-safe client registry, shared read-many/write-few: `touch` races
/// are tolerated since `last_activity` only ever moves forward.
pub struct ClientRegistry {
    clients: Arc<DashMap<String, ClientSession>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            clients: Arc::new(DashMap::new()),
        }
    }

    /// Register a client. Re-registering an existing id preserves its
    /// original `registered_at` and refreshes `last_activity`.
    pub fn register(&self, client_id: String, project_key: String, pid: Option<u32>) -> RegisterOutcome {
        let registered_at = match self.clients.get(&client_id) {
            Some(existing) => existing.registered_at,
            None => Utc::now(),
        };
        self.clients
            .entry(client_id.clone())
            .and_modify(|c| c.touch())
            .or_insert_with(|| ClientSession::new(client_id.clone(), project_key.clone(), pid));

        RegisterOutcome {
            client_id,
            registered_at,
            total_clients: self.clients.len(),
        }
    }

    pub fn deregister(&self, client_id: &str) -> DeregisterOutcome {
        let was_registered = self.clients.remove(client_id).is_some();
        DeregisterOutcome {
            client_id: client_id.to_string(),
            was_registered,
            total_clients: self.clients.len(),
        }
    }

    /// Refresh `last_activity` for a known client. Returns `false` if the
    /// client id is not registered; callers treat that as a no-op, not an
    /// error, since a request can arrive before its client's registration
    /// does.
    pub fn touch(&self, client_id: &str) -> bool {
        match self.clients.get_mut(client_id) {
            Some(mut entry) => {
                entry.touch();
                true
            }
            None => false,
        }
    }

    pub fn list(&self) -> Vec<ClientSession> {
        self.clients.iter().map(|r| r.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Remove every client whose idle duration exceeds `threshold`.
    /// Returns the number removed.
    pub fn reap_stale(&self, threshold: chrono::Duration) -> usize {
        let stale: Vec<String> = self
            .clients
            .iter()
            .filter(|r| r.value().idle_for() > threshold)
            .map(|r| r.key().clone())
            .collect();
        for id in &stale {
            self.clients.remove(id);
        }
        stale.len()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
