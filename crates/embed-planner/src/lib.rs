//! # embed-planner
//!
//! Splits a caller's texts into cache hits, single-flight waits, and
//! pool-bound batches, then reassembles every result in the caller's
//! original order.

pub mod plan;

pub use plan::{run, PlanStats};
