//! # embed-observability
//!
//! Health reporting, metrics collection, structured tracing, and
//! degradation tracking for the embedding service.

pub mod call_log;
pub mod degradation;
pub mod engine;
pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use call_log::{CallLog, CallLogEntry};
pub use engine::ObservabilityEngine;
pub use health::{HealthChecker, HealthReport, HealthSnapshot, HealthStatus};
pub use metrics::MetricsCollector;
