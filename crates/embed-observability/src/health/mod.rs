//! Health reporting subsystem: snapshot in, report and recommendations out.

pub mod recommendations;
pub mod reporter;
pub mod subsystem_checks;

pub use recommendations::Recommendation;
pub use reporter::{HealthReport, HealthReporter, HealthSnapshot, HealthStatus, SubsystemHealth};
pub use subsystem_checks::SubsystemChecker;

use embed_core::errors::EmbedResult;

/// Holds the most recently pushed snapshot and builds reports from it on
/// demand. The engine updates the snapshot once per `/status` request
/// (or on a periodic tick); producing the report itself is pure and
/// cheap enough to redo every call.
#[derive(Debug, Default)]
pub struct HealthChecker {
    snapshot: HealthSnapshot,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_snapshot(&mut self, snapshot: HealthSnapshot) {
        self.snapshot = snapshot;
    }

    pub fn report(&self) -> EmbedResult<HealthReport> {
        HealthReporter::build(&self.snapshot)
    }

    pub fn recommendations(&self) -> Vec<Recommendation> {
        HealthReporter::recommendations(&self.snapshot)
    }
}
