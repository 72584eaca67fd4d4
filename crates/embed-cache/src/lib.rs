//! # embed-cache
//!
//! Two-tier, content-addressed embedding cache. An on-disk, fixed-layout,
//! memory-mapped shard backs every `Get`; concurrent misses on the same
//! fingerprint single-flight through [`cache::Cache::reserve`] so only one
//! caller ever computes a given embedding at a time.

pub mod cache;
pub mod layout;
pub mod singleflight;
pub mod store;

pub use cache::{Cache, ReserveOutcome, ReserveToken};
pub use singleflight::Waiter;
pub use store::OpenOutcome;
