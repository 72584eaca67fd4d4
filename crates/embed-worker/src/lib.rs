//! # embed-worker
//!
//! One embedding worker: a single external child process speaking a
//! line-delimited JSON protocol, wrapped in a small lifecycle state
//! machine the pool drives.

pub mod process;
pub mod protocol;
pub mod worker;

pub use protocol::{BatchOutcome, Request, RequestId, Response};
pub use worker::{Worker, WorkerState};
