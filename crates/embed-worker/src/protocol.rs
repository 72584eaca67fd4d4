//! Wire protocol spoken over a worker child's stdin/stdout: one JSON
//! object per line in each direction. A fixed, tagged-enum schema rather
//! than a loosely-typed field bag, so a malformed or future-version
//! worker fails to deserialize loudly instead of silently dropping
//! fields the pool actually needed.

use serde::{Deserialize, Serialize};

pub type RequestId = u64;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Sent exactly once, immediately after spawn. The worker must reply
    /// with `InitComplete` before any `EmbedBatch` is sent.
    Init { model_id: String, dim: usize },
    /// Compute embeddings for `texts`, in order. `deadline_ms` is the
    /// hard time budget from the pool's perspective; past it the pool
    /// gives up on the worker entirely and marks it dead. `soft_deadline_ms`
    /// is the contract for a graceful partial result: if the worker cannot
    /// finish all `texts` by then, it should emit `EmbedComplete` with a
    /// `Partial` outcome carrying whatever it has rather than run to
    /// `deadline_ms` and risk being killed mid-batch.
    EmbedBatch {
        request_id: RequestId,
        texts: Vec<String>,
        soft_deadline_ms: u64,
        deadline_ms: u64,
    },
    /// Ask the worker to report its resident memory, used by the pool's
    /// health reporting.
    QueryMemory,
    /// Graceful shutdown: finish the in-flight batch (if any), then exit.
    Shutdown,
    /// Immediate shutdown: the pool has given up waiting on `Shutdown`.
    Abort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    InitComplete { model_id: String, dim: usize },
    /// Optional liveness signal during a long batch. Resets the pool's
    /// stall timer for the request it names.
    Progress {
        request_id: RequestId,
        completed: usize,
        total: usize,
    },
    EmbedComplete {
        request_id: RequestId,
        outcome: BatchOutcome,
    },
    /// Sent by the pool's own stall watchdog, not the worker, when a
    /// batch has gone quiet past `worker_stall_ms`; kept in the same enum
    /// so pool-internal and worker-originated events share one log shape.
    TimeoutWarning { request_id: RequestId },
    MemoryResponse { rss_bytes: u64 },
    /// An out-of-band failure unrelated to any specific batch (e.g. model
    /// load failed at startup).
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    Ok { vectors: Vec<Vec<f32>> },
    /// Some indices succeeded; `vectors[i]` is `None` for a missing index.
    Partial {
        vectors: Vec<Option<Vec<f32>>>,
        missing_indices: Vec<usize>,
    },
    Err { message: String },
}

/// Serialize `req` as a single line of JSON terminated by `\n`.
pub fn encode_request(req: &Request) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(req)?;
    line.push('\n');
    Ok(line)
}

/// Parse one line of JSON as a `Response`.
pub fn decode_response(line: &str) -> serde_json::Result<Response> {
    serde_json::from_str(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_roundtrips_through_json() {
        let req = Request::EmbedBatch {
            request_id: 7,
            texts: vec!["a".into(), "b".into()],
            soft_deadline_ms: 500,
            deadline_ms: 2000,
        };
        let line = encode_request(&req).unwrap();
        assert!(line.ends_with('\n'));
        let back: Request = serde_json::from_str(line.trim_end()).unwrap();
        match back {
            Request::EmbedBatch { request_id, texts, .. } => {
                assert_eq!(request_id, 7);
                assert_eq!(texts.len(), 2);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn response_tags_are_stable_strings() {
        let r = Response::InitComplete {
            model_id: "m".into(),
            dim: 384,
        };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["type"], "init_complete");
    }

    #[test]
    fn partial_outcome_roundtrips() {
        let outcome = BatchOutcome::Partial {
            vectors: vec![Some(vec![1.0]), None],
            missing_indices: vec![1],
        };
        let json = serde_json::to_string(&outcome).unwrap();
        let back: BatchOutcome = serde_json::from_str(&json).unwrap();
        match back {
            BatchOutcome::Partial { missing_indices, .. } => assert_eq!(missing_indices, vec![1]),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn malformed_line_fails_to_decode() {
        assert!(decode_response("not json").is_err());
    }
}
