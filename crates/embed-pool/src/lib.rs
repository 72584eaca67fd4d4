//! # embed-pool
//!
//! Fixed-size pool of embedding workers: one shared FIFO queue, crash
//! detection and respawn, and a `Degraded` state once replacement keeps
//! failing within a rolling window.

pub mod pool;
pub mod types;

pub use pool::{Pool, PoolHealth};
pub use types::BatchRequest;
