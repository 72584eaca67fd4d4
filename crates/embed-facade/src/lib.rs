//! # embed-facade
//!
//! The single `embed()` entry point composing the cache, pool, and
//! planner, with one automatic retry pass for recoverable failures.

pub mod facade;

pub use facade::{EmbedOptions, Facade, FacadeHealth, Stats};
