//! Degradation event accounting, shared by any component that falls back
//! to a secondary path and wants that fallback to stay visible to
//! operators rather than disappearing into a successful response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded instance of a component falling back to a secondary
/// behavior instead of failing outright.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradationEvent {
    pub component: String,
    pub failure: String,
    pub fallback_used: String,
    pub timestamp: DateTime<Utc>,
}

impl DegradationEvent {
    pub fn new(component: impl Into<String>, failure: impl Into<String>, fallback_used: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            failure: failure.into(),
            fallback_used: fallback_used.into(),
            timestamp: Utc::now(),
        }
    }
}
