//! Record every degradation event: component, failure mode, fallback
//! used, timestamp, recovery status.

use chrono::{DateTime, Utc};
use embed_core::DegradationEvent;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Recovery status of a degradation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryStatus {
    /// Still in degraded mode.
    Active,
    /// Recovered to normal operation.
    Recovered,
}

/// A tracked degradation event with recovery status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedDegradation {
    pub event: DegradationEvent,
    pub recovery_status: RecoveryStatus,
    pub recovered_at: Option<DateTime<Utc>>,
}

/// Tracks all degradation events for alerting and the `/status` endpoint.
#[derive(Debug, Clone, Default)]
pub struct DegradationTracker {
    events: Vec<TrackedDegradation>,
}

impl DegradationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new degradation event.
    pub fn record(&mut self, event: DegradationEvent) {
        warn!(
            component = %event.component,
            failure = %event.failure,
            fallback_used = %event.fallback_used,
            "degradation event recorded"
        );
        self.events.push(TrackedDegradation {
            event,
            recovery_status: RecoveryStatus::Active,
            recovered_at: None,
        });
    }

    /// Record every event from a facade drain in one call.
    pub fn record_all(&mut self, events: Vec<DegradationEvent>) {
        for event in events {
            self.record(event);
        }
    }

    /// Mark a component as recovered.
    pub fn mark_recovered(&mut self, component: &str) {
        let now = Utc::now();
        for tracked in self.events.iter_mut().rev() {
            if tracked.event.component == component && tracked.recovery_status == RecoveryStatus::Active {
                tracked.recovery_status = RecoveryStatus::Recovered;
                tracked.recovered_at = Some(now);
                break;
            }
        }
    }

    pub fn events(&self) -> &[TrackedDegradation] {
        &self.events
    }

    pub fn active_degradations(&self) -> Vec<&TrackedDegradation> {
        self.events
            .iter()
            .filter(|t| t.recovery_status == RecoveryStatus::Active)
            .collect()
    }

    pub fn count_recent(&self, component: &str, window_secs: i64) -> usize {
        let cutoff = Utc::now() - chrono::Duration::seconds(window_secs);
        self.events
            .iter()
            .filter(|t| t.event.component == component && t.event.timestamp > cutoff)
            .count()
    }

    pub fn count_all_recent(&self, window_secs: i64) -> usize {
        let cutoff = Utc::now() - chrono::Duration::seconds(window_secs);
        self.events.iter().filter(|t| t.event.timestamp > cutoff).count()
    }

    /// Duration a component has been continuously degraded, or `None` if
    /// not currently degraded.
    pub fn degraded_duration(&self, component: &str) -> Option<chrono::Duration> {
        let earliest = self
            .events
            .iter()
            .filter(|t| t.event.component == component && t.recovery_status == RecoveryStatus::Active)
            .map(|t| t.event.timestamp)
            .min()?;
        Some(Utc::now() - earliest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_most_recent_active_event_recovered() {
        let mut tracker = DegradationTracker::new();
        tracker.record(DegradationEvent::new("pool", "worker crashed", "respawned"));
        tracker.mark_recovered("pool");

        assert_eq!(tracker.active_degradations().len(), 0);
        assert_eq!(tracker.events()[0].recovery_status, RecoveryStatus::Recovered);
    }

    #[test]
    fn count_recent_scopes_to_window_and_component() {
        let mut tracker = DegradationTracker::new();
        tracker.record(DegradationEvent::new("pool", "crash", "respawn"));
        tracker.record(DegradationEvent::new("cache", "storage full", "skip cache write"));

        assert_eq!(tracker.count_recent("pool", 3600), 1);
        assert_eq!(tracker.count_all_recent(3600), 2);
    }
}
