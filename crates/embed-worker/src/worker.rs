//! A single embedding worker: one external child process plus the state
//! machine tracking its lifecycle from the pool's point of view.

use std::time::{Duration, Instant};

use embed_core::errors::{EmbedError, EmbedResult};
use tracing::{info, warn};

use crate::process::ChildProcess;
use crate::protocol::{BatchOutcome, Request, RequestId, Response};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Process spawned, awaiting `InitComplete`.
    Spawning,
    /// Ready to accept a batch.
    Idle,
    /// A batch is in flight.
    Busy,
    /// `Shutdown` sent, waiting for the process to exit on its own.
    Draining,
    /// Process exited or was killed; not usable again.
    Dead,
}

pub struct Worker {
    id: u32,
    process: ChildProcess,
    state: WorkerState,
    model_id: String,
    dim: usize,
    next_request_id: RequestId,
}

impl Worker {
    /// Spawn a worker and block until it reports `InitComplete` or
    /// `init_timeout` elapses.
    pub async fn spawn(
        id: u32,
        command: &str,
        model_id: &str,
        dim: usize,
        init_timeout: Duration,
    ) -> EmbedResult<Self> {
        let mut process = ChildProcess::spawn(command)?;
        process
            .send(&Request::Init {
                model_id: model_id.to_string(),
                dim,
            })
            .await?;

        let resp = tokio::time::timeout(init_timeout, process.responses.recv())
            .await
            .map_err(|_| EmbedError::WorkerCrashed {
                message: format!("worker {id} did not respond to init within timeout"),
            })?
            .ok_or_else(|| EmbedError::WorkerCrashed {
                message: format!("worker {id} exited before init completed"),
            })?;

        match resp {
            Response::InitComplete { model_id: got_model, dim: got_dim } => {
                if got_model != model_id || got_dim != dim {
                    return Err(EmbedError::WorkerCrashed {
                        message: format!(
                            "worker {id} initialized with mismatched model ({got_model}/{got_dim}), expected ({model_id}/{dim})"
                        ),
                    });
                }
            }
            Response::Error { message } => {
                return Err(EmbedError::WorkerCrashed {
                    message: format!("worker {id} init failed: {message}"),
                });
            }
            other => {
                return Err(EmbedError::WorkerCrashed {
                    message: format!("worker {id} sent unexpected response during init: {other:?}"),
                });
            }
        }

        info!(worker_id = id, model_id, dim, "worker initialized");
        Ok(Self {
            id,
            process,
            state: WorkerState::Idle,
            model_id: model_id.to_string(),
            dim,
            next_request_id: 0,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Dispatch one batch and await its outcome, honoring `stall_timeout`
    /// (no `Progress`/`EmbedComplete` for this long means the worker is
    /// wedged), `soft_deadline` (the point past which the worker should
    /// reply `Partial` rather than keep computing), and `hard_deadline`
    /// (the batch's total time budget). On either stall or hard-deadline
    /// expiry the worker is marked `Dead`; the pool must respawn.
    pub async fn dispatch(
        &mut self,
        texts: Vec<String>,
        stall_timeout: Duration,
        soft_deadline: Duration,
        hard_deadline: Duration,
    ) -> EmbedResult<BatchOutcome> {
        if self.state != WorkerState::Idle {
            return Err(EmbedError::internal(format!(
                "dispatch called on worker {} in state {:?}",
                self.id, self.state
            )));
        }
        self.state = WorkerState::Busy;

        let request_id = self.next_request_id;
        self.next_request_id += 1;

        self.process
            .send(&Request::EmbedBatch {
                request_id,
                texts,
                soft_deadline_ms: soft_deadline.as_millis() as u64,
                deadline_ms: hard_deadline.as_millis() as u64,
            })
            .await?;

        let deadline = Instant::now() + hard_deadline;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                self.state = WorkerState::Dead;
                return Err(EmbedError::Timeout {
                    elapsed_ms: hard_deadline.as_millis() as u64,
                });
            }
            let wait = stall_timeout.min(remaining);

            match tokio::time::timeout(wait, self.process.responses.recv()).await {
                Ok(Some(Response::Progress { request_id: rid, .. })) if rid == request_id => {
                    continue;
                }
                Ok(Some(Response::EmbedComplete { request_id: rid, outcome })) if rid == request_id => {
                    self.state = WorkerState::Idle;
                    return Ok(outcome);
                }
                Ok(Some(Response::Error { message })) => {
                    self.state = WorkerState::Dead;
                    return Err(EmbedError::WorkerCrashed { message });
                }
                Ok(Some(_stale)) => {
                    // Response for a prior request_id; ignore and keep waiting.
                    continue;
                }
                Ok(None) => {
                    self.state = WorkerState::Dead;
                    return Err(EmbedError::WorkerCrashed {
                        message: format!("worker {} exited mid-batch", self.id),
                    });
                }
                Err(_elapsed) => {
                    warn!(worker_id = self.id, request_id, "worker stalled, aborting");
                    self.state = WorkerState::Dead;
                    return Err(EmbedError::WorkerCrashed {
                        message: format!("worker {} stalled past {:?}", self.id, stall_timeout),
                    });
                }
            }
        }
    }

    pub async fn query_memory(&mut self, timeout: Duration) -> EmbedResult<u64> {
        self.process.send(&Request::QueryMemory).await?;
        match tokio::time::timeout(timeout, self.process.responses.recv()).await {
            Ok(Some(Response::MemoryResponse { rss_bytes })) => Ok(rss_bytes),
            Ok(Some(_)) | Ok(None) => Err(EmbedError::internal("worker did not answer memory query")),
            Err(_) => Err(EmbedError::Timeout {
                elapsed_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// Ask the worker to exit, waiting up to `grace` before escalating to
    /// `abort`.
    pub async fn shutdown(&mut self, grace: Duration) {
        if self.state == WorkerState::Dead {
            return;
        }
        self.state = WorkerState::Draining;
        if self.process.send(&Request::Shutdown).await.is_err() {
            self.abort().await;
            return;
        }
        if !self.process.wait_for_exit(grace).await {
            warn!(worker_id = self.id, "worker did not exit within grace period, aborting");
            self.abort().await;
        } else {
            self.state = WorkerState::Dead;
        }
    }

    /// Immediate, non-negotiable termination.
    pub async fn abort(&mut self) {
        let _ = self.process.send(&Request::Abort).await;
        self.process.kill().await;
        self.state = WorkerState::Dead;
    }
}
