//! Fixed-size worker pool.
//!
//! `N` worker loops pull batches off one shared FIFO queue; whichever
//! loop is idle and reaches the queue first takes the next batch, which
//! is observably equivalent to round-robin dispatch over idle workers
//! since every worker implements the same embedding function. Each loop
//! owns exactly one [`Worker`] at a time and respawns it on crash.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use embed_core::config::ServerConfig;
use embed_core::errors::{EmbedError, EmbedResult};
use embed_worker::Worker;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{error, info, warn};

use crate::types::BatchRequest;

/// Health snapshot used by `embed-observability`.
#[derive(Debug, Clone)]
pub struct PoolHealth {
    pub worker_count: usize,
    pub degraded: bool,
    pub queue_depth: usize,
    pub queue_high_water: usize,
}

struct PoolState {
    degraded: AtomicBool,
    draining: AtomicBool,
    replacement_failures: parking_lot::Mutex<VecDeque<Instant>>,
    max_replacement_failures: u32,
    failure_window: Duration,
}

impl PoolState {
    fn record_replacement_failure(&self) -> bool {
        let mut log = self.replacement_failures.lock();
        let now = Instant::now();
        log.push_back(now);
        while let Some(front) = log.front() {
            if now.duration_since(*front) > self.failure_window {
                log.pop_front();
            } else {
                break;
            }
        }
        let degraded = log.len() as u32 >= self.max_replacement_failures;
        if degraded {
            self.degraded.store(true, Ordering::SeqCst);
        }
        degraded
    }

    fn clear_replacement_failures(&self) {
        self.replacement_failures.lock().clear();
        self.degraded.store(false, Ordering::SeqCst);
    }
}

pub struct Pool {
    tx: mpsc::Sender<BatchRequest>,
    state: Arc<PoolState>,
    worker_count: usize,
    queue_high_water: usize,
    loops: Vec<tokio::task::JoinHandle<()>>,
}

impl Pool {
    pub fn start(config: Arc<ServerConfig>) -> Self {
        let queue_high_water = config.effective_queue_high_water();
        let (tx, rx) = mpsc::channel(queue_high_water);
        let shared_rx = Arc::new(AsyncMutex::new(rx));

        let state = Arc::new(PoolState {
            degraded: AtomicBool::new(false),
            draining: AtomicBool::new(false),
            replacement_failures: parking_lot::Mutex::new(VecDeque::new()),
            max_replacement_failures: embed_core::constants::MAX_REPLACEMENT_FAILURES,
            failure_window: Duration::from_secs(
                embed_core::constants::REPLACEMENT_FAILURE_WINDOW_SECS as u64,
            ),
        });

        let mut loops = Vec::with_capacity(config.max_workers);
        for i in 0..config.max_workers {
            let rx = shared_rx.clone();
            let state = state.clone();
            let config = config.clone();
            loops.push(tokio::spawn(worker_loop(i as u32, rx, state, config)));
        }

        Self {
            tx,
            state,
            worker_count: config.max_workers,
            queue_high_water,
            loops,
        }
    }

    /// Enqueue a batch. Fails fast with `Overloaded` if the queue is at
    /// its high-water mark, and with `Draining` once `shutdown` has been
    /// called.
    pub async fn submit(&self, req: BatchRequest) -> EmbedResult<()> {
        if self.state.draining.load(Ordering::SeqCst) {
            return Err(EmbedError::Draining);
        }
        if self.state.degraded.load(Ordering::SeqCst) {
            return Err(EmbedError::Degraded {
                message: "worker pool has exhausted replacement attempts".to_string(),
            });
        }
        self.tx.try_send(req).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EmbedError::Overloaded {
                message: format!("queue at high-water mark ({})", self.queue_high_water),
            },
            mpsc::error::TrySendError::Closed(_) => EmbedError::Draining,
        })
    }

    pub fn health(&self) -> PoolHealth {
        let in_use = self.queue_high_water.saturating_sub(self.tx.capacity());
        PoolHealth {
            worker_count: self.worker_count,
            degraded: self.state.degraded.load(Ordering::SeqCst),
            queue_depth: in_use,
            queue_high_water: self.queue_high_water,
        }
    }

    /// Stop accepting new work, let in-flight batches drain up to `grace`,
    /// then abort whatever is left.
    pub async fn shutdown(self, grace: Duration) {
        self.state.draining.store(true, Ordering::SeqCst);
        drop(self.tx); // closes the channel once queued items are drained

        let deadline = tokio::time::Instant::now() + grace;
        for handle in self.loops {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if tokio::time::timeout(remaining, handle).await.is_err() {
                warn!("worker loop did not finish draining within grace period, abandoning");
            }
        }
    }
}

async fn worker_loop(
    index: u32,
    rx: Arc<AsyncMutex<mpsc::Receiver<BatchRequest>>>,
    state: Arc<PoolState>,
    config: Arc<ServerConfig>,
) {
    let mut worker: Option<Worker> = None;
    let stall_timeout = Duration::from_millis(config.worker_stall_ms);
    let soft_deadline = Duration::from_millis(config.batch_soft_deadline_ms);
    let hard_deadline = Duration::from_millis(config.batch_hard_deadline_ms);

    loop {
        let req = {
            let mut guard = rx.lock().await;
            guard.recv().await
        };
        let Some(req) = req else {
            info!(worker_index = index, "queue closed, worker loop exiting");
            return;
        };

        if worker.is_none() {
            match ensure_worker(index, &config, &state).await {
                Some(w) => worker = Some(w),
                None => {
                    let _ = req.reply.send(Err(EmbedError::Degraded {
                        message: "no worker available after replacement failures".to_string(),
                    }));
                    continue;
                }
            }
        }

        let w = worker.as_mut().expect("checked above");
        match w.dispatch(req.texts, stall_timeout, soft_deadline, hard_deadline).await {
            Ok(outcome) => {
                let _ = req.reply.send(Ok(outcome));
            }
            Err(e) => {
                error!(worker_index = index, error = %e, "worker dispatch failed, will respawn");
                worker = None; // force respawn on the next request
                let _ = req.reply.send(Err(e));
            }
        }
    }
}

async fn ensure_worker(
    index: u32,
    config: &ServerConfig,
    state: &Arc<PoolState>,
) -> Option<Worker> {
    const MAX_ATTEMPTS: u32 = 5;
    for attempt in 0..MAX_ATTEMPTS {
        match Worker::spawn(
            index,
            &config.worker_command,
            &config.model_id,
            config.dim,
            Duration::from_millis(config.batch_hard_deadline_ms),
        )
        .await
        {
            Ok(w) => {
                state.clear_replacement_failures();
                return Some(w);
            }
            Err(e) => {
                warn!(worker_index = index, attempt, error = %e, "worker respawn failed");
                if state.record_replacement_failure() {
                    error!(worker_index = index, "pool entering degraded state");
                    return None;
                }
                tokio::time::sleep(Duration::from_millis(200 * (attempt as u64 + 1))).await;
            }
        }
    }
    None
}
