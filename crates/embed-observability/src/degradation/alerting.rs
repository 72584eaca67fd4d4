//! Alert thresholds: more than `MAX_REPLACEMENT_FAILURES` events for one
//! component inside the replacement-failure window → warning; the same
//! component still degraded after 10 minutes → critical.

use serde::{Deserialize, Serialize};

use super::tracker::DegradationTracker;

const CRITICAL_AFTER_MINUTES: i64 = 10;

/// Alert severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    None,
    Warning,
    Critical,
}

/// A degradation alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradationAlert {
    pub level: AlertLevel,
    pub component: String,
    pub message: String,
}

/// Evaluate alerts based on the current degradation tracker state.
pub fn evaluate_alerts(tracker: &DegradationTracker) -> Vec<DegradationAlert> {
    let mut alerts = Vec::new();
    let mut seen_components = std::collections::HashSet::new();
    let window_secs = embed_core::constants::REPLACEMENT_FAILURE_WINDOW_SECS as i64;

    for tracked in tracker.events() {
        let component = &tracked.event.component;
        if !seen_components.insert(component.clone()) {
            continue;
        }

        if let Some(duration) = tracker.degraded_duration(component) {
            if duration > chrono::Duration::minutes(CRITICAL_AFTER_MINUTES) {
                alerts.push(DegradationAlert {
                    level: AlertLevel::Critical,
                    component: component.clone(),
                    message: format!(
                        "{component} has been degraded for over {CRITICAL_AFTER_MINUTES} minutes"
                    ),
                });
                continue;
            }
        }

        let recent_count = tracker.count_recent(component, window_secs);
        if recent_count as u32 > embed_core::constants::MAX_REPLACEMENT_FAILURES {
            alerts.push(DegradationAlert {
                level: AlertLevel::Warning,
                component: component.clone(),
                message: format!(
                    "{component} has {recent_count} degradation events in the last {window_secs}s"
                ),
            });
        }
    }

    alerts
}
