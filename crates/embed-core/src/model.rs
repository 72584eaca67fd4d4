//! Shared value types used across cache, pool, planner, and facade crates.

use serde::{Deserialize, Serialize};

use crate::constants::DIM;
use crate::errors::{EmbedError, EmbedResult};

/// Opaque identifier for the embedding function that produced a vector.
/// Cache entries produced by a different model id are invisible to readers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelId(pub String);

impl ModelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated, L2-normalized embedding vector of exactly [`DIM`] components.
///
/// Construction validates length and finiteness so that once an
/// `EmbeddingVector` exists, every downstream reader can assume both
/// invariants hold without re-checking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingVector(Vec<f32>);

impl EmbeddingVector {
    /// Validate and wrap a raw vector. Does not renormalize — callers
    /// (providers, cache readers) are expected to hand over already
    /// L2-normalized data; this only checks the invariants readers rely on.
    pub fn new(raw: Vec<f32>) -> EmbedResult<Self> {
        if raw.len() != DIM {
            return Err(EmbedError::InvalidVector {
                message: format!("expected {DIM} components, got {}", raw.len()),
            });
        }
        if raw.iter().any(|v| !v.is_finite()) {
            return Err(EmbedError::InvalidVector {
                message: "vector contains non-finite components".to_string(),
            });
        }
        Ok(Self(raw))
    }

    /// Wrap a raw vector without validation. Used only on the read path
    /// where the bytes came from a cache slot that was validated at
    /// publish time.
    pub fn from_validated(raw: Vec<f32>) -> Self {
        debug_assert_eq!(raw.len(), DIM);
        Self(raw)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.0
    }

    pub fn l2_norm(&self) -> f32 {
        self.0.iter().map(|x| x * x).sum::<f32>().sqrt()
    }
}
