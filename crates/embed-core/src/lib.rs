//! # embed-core
//!
//! Foundation crate for the embedding service. Defines the data model,
//! error taxonomy, configuration, constants, and the content fingerprinter.
//! Every other crate in the workspace depends on this.

pub mod config;
pub mod constants;
pub mod degradation;
pub mod errors;
pub mod fingerprint;
pub mod model;

pub use config::ServerConfig;
pub use degradation::DegradationEvent;
pub use errors::{EmbedError, EmbedResult};
pub use fingerprint::{fingerprint, Fingerprint};
pub use model::{EmbeddingVector, ModelId};
