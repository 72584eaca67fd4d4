//! Error taxonomy (spec §7) shared by every crate in the workspace.

use serde::{Deserialize, Serialize};

/// Result alias used throughout the workspace.
pub type EmbedResult<T> = Result<T, EmbedError>;

/// The full error taxonomy for the embedding service.
///
/// Each variant maps to exactly one `kind` string in the HTTP error body
/// and one HTTP status code (see `embed-server::error_response`).
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmbedError {
    /// Malformed request: empty text, dimension mismatch in supplied data.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// A vector failed validation on publish (wrong dimension or non-finite).
    #[error("invalid vector: {message}")]
    InvalidVector { message: String },

    /// Queue full; retriable with backoff.
    #[error("overloaded: {message}")]
    Overloaded { message: String },

    /// Batch exceeded its hard deadline with no partial result.
    #[error("timeout after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// Some indices returned; caller may retry only the missing ones.
    #[error("partial result: {missing_count} of {total} indices missing")]
    Partial {
        missing_indices: Vec<usize>,
        missing_count: usize,
        total: usize,
    },

    /// In-flight batch lost to a worker crash; pool handles replacement.
    #[error("worker crashed: {message}")]
    WorkerCrashed { message: String },

    /// Cache write could not complete; the vector is still returned to the
    /// caller, but was not persisted.
    #[error("storage full: {message}")]
    StorageFull { message: String },

    /// Server is draining; non-retriable during this state.
    #[error("server is draining")]
    Draining,

    /// Pool has exhausted replacement attempts; non-retriable during this
    /// state.
    #[error("service degraded: {message}")]
    Degraded { message: String },

    /// Caller aborted the call.
    #[error("cancelled")]
    Cancelled,

    /// Catch-all for unexpected internal failures (I/O errors, poisoned
    /// locks, serialization failures encountered off the hot path).
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl EmbedError {
    /// Stable machine-readable kind string, echoed in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            EmbedError::InvalidInput { .. } => "invalid_input",
            EmbedError::InvalidVector { .. } => "invalid_vector",
            EmbedError::Overloaded { .. } => "overloaded",
            EmbedError::Timeout { .. } => "timeout",
            EmbedError::Partial { .. } => "partial",
            EmbedError::WorkerCrashed { .. } => "worker_crashed",
            EmbedError::StorageFull { .. } => "storage_full",
            EmbedError::Draining => "draining",
            EmbedError::Degraded { .. } => "degraded",
            EmbedError::Cancelled => "cancelled",
            EmbedError::Internal { .. } => "internal",
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        EmbedError::InvalidInput {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        EmbedError::Internal {
            message: message.into(),
        }
    }
}
