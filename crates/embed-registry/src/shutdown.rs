//! AutoShutdownController — the no-clients/idle countdown state machine
//! that drives the server into `Draining`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::registry::ClientRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Active,
    CountdownNoClients,
    CountdownIdle,
    Draining,
}

struct Inner {
    state: ShutdownState,
    /// Set when a countdown is armed; cleared on cancellation. At most one
    /// countdown is armed at a time, matching the single-timer invariant.
    deadline: Option<Instant>,
    last_request: Instant,
}

/// Polls registry size and request recency on a fixed tick, moving
/// through `Active -> CountdownNoClients|CountdownIdle -> Draining`.
/// `Draining` is terminal: once reached, the poller stops and `drained()`
/// resolves.
pub struct AutoShutdownController {
    inner: Mutex<Inner>,
    no_clients_timeout: Duration,
    idle_timeout: Duration,
    drain: watch::Sender<bool>,
}

impl AutoShutdownController {
    pub fn new(no_clients_timeout: Duration, idle_timeout: Duration) -> Arc<Self> {
        let (drain, _rx) = watch::channel(false);
        Arc::new(Self {
            inner: Mutex::new(Inner {
                state: ShutdownState::Active,
                deadline: None,
                last_request: Instant::now(),
            }),
            no_clients_timeout,
            idle_timeout,
            drain,
        })
    }

    pub fn state(&self) -> ShutdownState {
        self.inner.lock().state
    }

    pub fn is_draining(&self) -> bool {
        self.state() == ShutdownState::Draining
    }

    /// Cancels a pending idle countdown and records request recency.
    /// Called on every inbound request, registered client or not.
    pub fn record_request(&self) {
        let mut inner = self.inner.lock();
        inner.last_request = Instant::now();
        if inner.state == ShutdownState::CountdownIdle {
            inner.state = ShutdownState::Active;
            inner.deadline = None;
        }
    }

    /// Cancels a pending no-clients countdown. Called on `Register`.
    pub fn record_register(&self) {
        let mut inner = self.inner.lock();
        if inner.state == ShutdownState::CountdownNoClients {
            inner.state = ShutdownState::Active;
            inner.deadline = None;
        }
    }

    pub fn subscribe_drain(&self) -> watch::Receiver<bool> {
        self.drain.subscribe()
    }

    /// Spawn the background poller. Intended to run for the lifetime of
    /// the server; stops itself once `Draining` is reached.
    pub fn spawn(self: Arc<Self>, registry: Arc<ClientRegistry>, tick: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.tick().await;
            loop {
                interval.tick().await;
                if self.evaluate(&registry) {
                    info!("auto-shutdown controller entering draining state");
                    break;
                }
            }
        })
    }

    /// One evaluation step. Returns `true` once `Draining` is reached.
    fn evaluate(&self, registry: &ClientRegistry) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        if inner.state == ShutdownState::Draining {
            return true;
        }

        if registry.is_empty() {
            match inner.state {
                ShutdownState::CountdownNoClients => {
                    if now >= inner.deadline.unwrap_or(now) {
                        inner.state = ShutdownState::Draining;
                        let _ = self.drain.send(true);
                        return true;
                    }
                }
                _ => {
                    inner.state = ShutdownState::CountdownNoClients;
                    inner.deadline = Some(now + self.no_clients_timeout);
                }
            }
            return false;
        }

        let idle_elapsed = now.saturating_duration_since(inner.last_request);
        if idle_elapsed > self.idle_timeout {
            match inner.state {
                ShutdownState::CountdownIdle => {
                    if now >= inner.deadline.unwrap_or(now) {
                        inner.state = ShutdownState::Draining;
                        let _ = self.drain.send(true);
                        return true;
                    }
                }
                _ => {
                    inner.state = ShutdownState::CountdownIdle;
                    inner.deadline = Some(now + self.idle_timeout);
                }
            }
            return false;
        }

        inner.state = ShutdownState::Active;
        inner.deadline = None;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ClientRegistry;

    #[test]
    fn stays_active_with_clients_and_recent_requests() {
        let ctrl = AutoShutdownController::new(Duration::from_secs(60), Duration::from_secs(60));
        let registry = Arc::new(ClientRegistry::new());
        registry.register("c1".to_string(), "proj".to_string(), None);
        assert!(!ctrl.evaluate(&registry));
        assert_eq!(ctrl.state(), ShutdownState::Active);
    }

    #[test]
    fn arms_no_clients_countdown_when_registry_empties() {
        let ctrl = AutoShutdownController::new(Duration::from_millis(20), Duration::from_secs(60));
        let registry = Arc::new(ClientRegistry::new());
        assert!(!ctrl.evaluate(&registry));
        assert_eq!(ctrl.state(), ShutdownState::CountdownNoClients);
    }

    #[test]
    fn no_clients_countdown_expires_into_draining() {
        let ctrl = AutoShutdownController::new(Duration::from_millis(10), Duration::from_secs(60));
        let registry = Arc::new(ClientRegistry::new());
        assert!(!ctrl.evaluate(&registry));
        std::thread::sleep(Duration::from_millis(20));
        assert!(ctrl.evaluate(&registry));
        assert_eq!(ctrl.state(), ShutdownState::Draining);
    }

    #[test]
    fn register_cancels_a_pending_no_clients_countdown() {
        let ctrl = AutoShutdownController::new(Duration::from_millis(10), Duration::from_secs(60));
        let registry = Arc::new(ClientRegistry::new());
        ctrl.evaluate(&registry);
        assert_eq!(ctrl.state(), ShutdownState::CountdownNoClients);

        registry.register("c1".to_string(), "proj".to_string(), None);
        ctrl.record_register();
        assert_eq!(ctrl.state(), ShutdownState::Active);
    }
}
