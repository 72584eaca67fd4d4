//! The batch planning algorithm: fingerprint every text, probe the
//! cache, single-flight the misses through the pool in bounded batches,
//! and reassemble every result back into the caller's original order.

use std::collections::HashSet;
use std::sync::Arc;

use embed_cache::{Cache, ReserveOutcome, ReserveToken};
use embed_core::errors::{EmbedError, EmbedResult};
use embed_core::fingerprint::fingerprint;
use embed_core::model::EmbeddingVector;
use embed_pool::{BatchRequest, Pool};
use embed_worker::BatchOutcome;
use futures::future::join_all;

/// Per-call accounting, surfaced by the facade's `Stats`.
#[derive(Debug, Clone, Default)]
pub struct PlanStats {
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub batches_dispatched: usize,
}

struct PendingCompute {
    index: usize,
    text: String,
    token: ReserveToken,
}

/// Plan and execute one `Embed` call. `texts.len()` results are always
/// returned, one per input index, each independently `Ok` or `Err` so a
/// caller can act on whichever subset succeeded.
pub async fn run(
    cache: &Arc<Cache>,
    pool: &Pool,
    max_batch_size: usize,
    texts: Vec<String>,
) -> (Vec<EmbedResult<EmbeddingVector>>, PlanStats) {
    let n = texts.len();
    let mut results: Vec<Option<EmbedResult<EmbeddingVector>>> = (0..n).map(|_| None).collect();
    let mut stats = PlanStats::default();

    let mut to_compute: Vec<PendingCompute> = Vec::new();
    let mut waiting: Vec<(usize, embed_cache::Waiter)> = Vec::new();

    for (i, text) in texts.into_iter().enumerate() {
        let fp = match fingerprint(&text) {
            Ok(fp) => fp,
            Err(e) => {
                results[i] = Some(Err(e));
                continue;
            }
        };

        if let Some(vector) = cache.get(&fp) {
            stats.cache_hits += 1;
            results[i] = Some(Ok(vector));
            continue;
        }

        stats.cache_misses += 1;
        match cache.reserve(fp) {
            Ok(ReserveOutcome::ToCompute(token)) => to_compute.push(PendingCompute { index: i, text, token }),
            Ok(ReserveOutcome::Waiting(waiter)) => waiting.push((i, waiter)),
            Err(e) => results[i] = Some(Err(e)),
        }
    }

    // Dispatch everything this caller owns the computation for, in
    // batches bounded by `max_batch_size`. `to_compute` is drained from
    // the front so ownership of each `ReserveToken` moves exactly once.
    while !to_compute.is_empty() {
        let take = max_batch_size.min(to_compute.len());
        let chunk: Vec<PendingCompute> = to_compute.drain(..take).collect();
        stats.batches_dispatched += 1;
        dispatch_chunk(cache, pool, chunk, &mut results).await;
    }

    // Await everyone else's in-flight computations concurrently.
    let waited = join_all(
        waiting
            .into_iter()
            .map(|(i, w)| async move { (i, w.await_result().await) }),
    )
    .await;
    for (i, r) in waited {
        results[i] = Some(r);
    }

    let results = results
        .into_iter()
        .map(|r| r.unwrap_or_else(|| Err(EmbedError::internal("index never assigned a result"))))
        .collect();
    (results, stats)
}

async fn dispatch_chunk(
    cache: &Arc<Cache>,
    pool: &Pool,
    chunk: Vec<PendingCompute>,
    results: &mut [Option<EmbedResult<EmbeddingVector>>],
) {
    let texts: Vec<String> = chunk.iter().map(|p| p.text.clone()).collect();
    let batch_len = chunk.len();

    let (req, rx) = BatchRequest::new(texts);
    if let Err(e) = pool.submit(req).await {
        abandon_all(cache, chunk, results, e);
        return;
    }

    let outcome = match rx.await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            abandon_all(cache, chunk, results, e);
            return;
        }
        Err(_) => {
            abandon_all(cache, chunk, results, EmbedError::internal("pool dropped the reply channel"));
            return;
        }
    };

    match outcome {
        BatchOutcome::Ok { vectors } => {
            for (pos, pending) in chunk.into_iter().enumerate() {
                let raw = vectors.get(pos).cloned().unwrap_or_default();
                resolve_one(cache, pending, results, raw);
            }
        }
        BatchOutcome::Partial { vectors, missing_indices } => {
            let missing: HashSet<usize> = missing_indices.into_iter().collect();
            for (pos, pending) in chunk.into_iter().enumerate() {
                if missing.contains(&pos) {
                    let e = EmbedError::Partial {
                        missing_indices: vec![pos],
                        missing_count: 1,
                        total: batch_len,
                    };
                    cache.abandon(pending.token, e.clone());
                    results[pending.index] = Some(Err(e));
                    continue;
                }
                match vectors.get(pos).cloned().flatten() {
                    Some(raw) => resolve_one(cache, pending, results, raw),
                    None => {
                        let e = EmbedError::internal("partial outcome missing a present index");
                        cache.abandon(pending.token, e.clone());
                        results[pending.index] = Some(Err(e));
                    }
                }
            }
        }
        BatchOutcome::Err { message } => {
            abandon_all(cache, chunk, results, EmbedError::WorkerCrashed { message });
        }
    }
}

fn resolve_one(
    cache: &Arc<Cache>,
    pending: PendingCompute,
    results: &mut [Option<EmbedResult<EmbeddingVector>>],
    raw: Vec<f32>,
) {
    match EmbeddingVector::new(raw) {
        Ok(vector) => {
            cache.publish(pending.token, vector.clone());
            results[pending.index] = Some(Ok(vector));
        }
        Err(e) => {
            cache.abandon(pending.token, e.clone());
            results[pending.index] = Some(Err(e));
        }
    }
}

fn abandon_all(
    cache: &Arc<Cache>,
    chunk: Vec<PendingCompute>,
    results: &mut [Option<EmbedResult<EmbeddingVector>>],
    error: EmbedError,
) {
    for pending in chunk {
        cache.abandon(pending.token, error.clone());
        results[pending.index] = Some(Err(error.clone()));
    }
}
