//! The embedder facade: the one entry point every caller (planner
//! clients, the HTTP surface) goes through. Composes fingerprinting,
//! cache probing, pool dispatch, and a single automatic retry of
//! indices that came back `Partial` on the first pass.

use std::sync::Arc;

use embed_cache::Cache;
use embed_core::config::ServerConfig;
use embed_core::errors::{EmbedError, EmbedResult};
use embed_core::model::EmbeddingVector;
use embed_core::DegradationEvent;
use embed_pool::{Pool, PoolHealth};
use parking_lot::Mutex;
use tracing::{info, warn};

/// Options for a single `embed` call. Currently empty — reserved for a
/// future per-call deadline override — but kept as a struct rather than
/// a bare `()` so adding fields later doesn't break every call site.
#[derive(Debug, Clone, Default)]
pub struct EmbedOptions {}

/// Per-call accounting returned alongside the vectors.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub batches_dispatched: usize,
    pub retried_indices: usize,
}

#[derive(Debug, Clone)]
pub struct FacadeHealth {
    pub pool: PoolHealth,
    pub cache_len: usize,
    pub cache_capacity: usize,
}

fn retry_eligible(err: &EmbedError) -> bool {
    matches!(
        err,
        EmbedError::Partial { .. }
            | EmbedError::Timeout { .. }
            | EmbedError::WorkerCrashed { .. }
            | EmbedError::StorageFull { .. }
    )
}

fn is_global(err: &EmbedError) -> bool {
    matches!(err, EmbedError::Draining | EmbedError::Degraded { .. })
}

pub struct Facade {
    cache: Arc<Cache>,
    pool: Pool,
    config: Arc<ServerConfig>,
    degradation_events: Mutex<Vec<DegradationEvent>>,
}

impl Facade {
    pub fn new(cache: Arc<Cache>, pool: Pool, config: Arc<ServerConfig>) -> Self {
        Self {
            cache,
            pool,
            config,
            degradation_events: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Embed every text in `texts`, returning vectors in the same order
    /// as the input. Fails the whole call only if a global pool state
    /// (`Draining`/`Degraded`) is in effect, or if some indices are still
    /// missing after one automatic retry.
    pub async fn embed(&self, texts: Vec<String>, _options: EmbedOptions) -> EmbedResult<(Vec<EmbeddingVector>, Stats)> {
        if texts.is_empty() {
            return Ok((Vec::new(), Stats::default()));
        }
        let total = texts.len();

        let (results1, plan_stats1) =
            embed_planner::run(&self.cache, &self.pool, self.config.max_batch_size, texts.clone()).await;

        let mut stats = Stats {
            cache_hits: plan_stats1.cache_hits,
            cache_misses: plan_stats1.cache_misses,
            batches_dispatched: plan_stats1.batches_dispatched,
            retried_indices: 0,
        };

        if let Some(global) = results1.iter().find_map(|r| r.as_ref().err()).filter(|e| is_global(e)) {
            return Err(global.clone());
        }

        let mut final_results: Vec<Option<EmbedResult<EmbeddingVector>>> =
            results1.into_iter().map(Some).collect();

        let retry_indices: Vec<usize> = final_results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| match r {
                Some(Err(e)) if retry_eligible(e) => Some(i),
                _ => None,
            })
            .collect();

        if !retry_indices.is_empty() {
            warn!(count = retry_indices.len(), "retrying indices that came back partial/timed out");
            stats.retried_indices = retry_indices.len();
            let retry_texts: Vec<String> = retry_indices.iter().map(|&i| texts[i].clone()).collect();
            let (retry_results, retry_plan_stats) =
                embed_planner::run(&self.cache, &self.pool, self.config.max_batch_size, retry_texts).await;

            stats.batches_dispatched += retry_plan_stats.batches_dispatched;
            stats.cache_hits += retry_plan_stats.cache_hits;
            stats.cache_misses += retry_plan_stats.cache_misses;

            let mut retry_results: Vec<Option<EmbedResult<EmbeddingVector>>> =
                retry_results.into_iter().map(Some).collect();

            let mut events = self.degradation_events.lock();
            for (pos, idx) in retry_indices.into_iter().enumerate() {
                let outcome = retry_results[pos].take().unwrap_or_else(|| {
                    Err(EmbedError::internal("retry result vector shorter than expected"))
                });
                events.push(DegradationEvent::new(
                    "embed-facade",
                    format!("index {idx} failed on first pass"),
                    if outcome.is_ok() { "retry_succeeded" } else { "retry_failed" },
                ));
                final_results[idx] = Some(outcome);
            }
        }

        let missing_indices: Vec<usize> = final_results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| match r {
                Some(Err(_)) => Some(i),
                _ => None,
            })
            .collect();

        if !missing_indices.is_empty() {
            info!(count = missing_indices.len(), total, "embed call returning partial");
            return Err(EmbedError::Partial {
                missing_count: missing_indices.len(),
                missing_indices,
                total,
            });
        }

        let vectors = final_results
            .into_iter()
            .map(|r| r.expect("every index assigned a result"))
            .collect::<EmbedResult<Vec<_>>>()?;

        Ok((vectors, stats))
    }

    pub fn health(&self) -> FacadeHealth {
        FacadeHealth {
            pool: self.pool.health(),
            cache_len: self.cache.len(),
            cache_capacity: self.cache.capacity(),
        }
    }

    /// Drain accumulated degradation events (retries, fallbacks) for
    /// observability. Subsequent calls only see events recorded after
    /// the previous drain.
    pub fn drain_degradation_events(&self) -> Vec<DegradationEvent> {
        std::mem::take(&mut self.degradation_events.lock())
    }

    pub async fn shutdown(self, grace: std::time::Duration) {
        self.cache.persist();
        self.pool.shutdown(grace).await;
    }
}
