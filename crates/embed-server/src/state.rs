//! Shared application state handed to every axum handler.

use std::sync::Arc;
use std::time::Instant;

use embed_facade::Facade;
use embed_observability::ObservabilityEngine;
use embed_registry::{AutoShutdownController, ClientRegistry};
use parking_lot::Mutex;

/// Everything a handler needs: the facade (cache + pool), the client
/// registry and its shutdown controller, and the observability engine.
/// Cloned cheaply per request since every field is an `Arc` or wraps one.
#[derive(Clone)]
pub struct AppState {
    pub facade: Arc<Facade>,
    pub registry: Arc<ClientRegistry>,
    pub shutdown: Arc<AutoShutdownController>,
    pub observability: Arc<Mutex<ObservabilityEngine>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn uptime_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }
}
