//! # embed-registry
//!
//! Client registry (register/deregister/touch/list/reap) and the
//! auto-shutdown controller that watches it.

pub mod client;
pub mod registry;
pub mod shutdown;

pub use client::ClientSession;
pub use registry::{ClientRegistry, DeregisterOutcome, RegisterOutcome};
pub use shutdown::{AutoShutdownController, ShutdownState};
