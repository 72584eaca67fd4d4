//! Public cache API: `Get`, `Reserve`/`Publish`/`Abandon`, `Evict`.
//!
//! Reads never block on the write path: `Get` only consults the in-memory
//! index (a [`DashMap`]) and then reads vector bytes directly out of the
//! mmap, which never move once published. Writers serialize through a
//! single [`parking_lot::Mutex`] guarding the on-disk mutation sequence;
//! that lock never overlaps with a plain `Get`.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use embed_core::errors::{EmbedError, EmbedResult};
use embed_core::fingerprint::Fingerprint;
use embed_core::model::EmbeddingVector;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::layout::EntryIndex;
use crate::singleflight::{ReserveToken as FlightToken, Reservation, SingleFlight, Waiter};
use crate::store::{OpenOutcome, RawView, Store};

fn now_millis() -> i64 {
    // A monotonically-increasing wall-clock stamp used only to order LRU
    // eviction candidates; sub-millisecond precision is not meaningful
    // here and panics on clock errors would take down the whole cache.
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// A handle returned by [`Cache::reserve`] when the caller owns the
/// computation for a fingerprint. Wraps the single-flight token together
/// with the allocated on-disk slot.
pub struct ReserveToken {
    flight: FlightToken,
    entry_idx: EntryIndex,
}

impl ReserveToken {
    pub fn fingerprint(&self) -> Fingerprint {
        self.flight.fingerprint()
    }
}

pub enum ReserveOutcome {
    ToCompute(ReserveToken),
    Waiting(Waiter),
}

/// Two-tier, content-addressed embedding cache for one model id.
///
/// "Two-tier" here means the on-disk mmap'd shard (durable across
/// restarts, bounded by `capacity`) backed directly by the OS page cache
/// as the in-memory tier — there is no separate in-process LRU structure
/// shadowing it, so there is exactly one eviction policy to reason about.
pub struct Cache {
    store: Mutex<Store>,
    raw: RawView,
    index: DashMap<Fingerprint, EntryIndex>,
    flight: SingleFlight,
    capacity: usize,
}

impl Cache {
    /// Open (or create, or invalidate-and-recreate) the shard at `path`.
    pub fn open(path: &Path, capacity: usize, dim: usize, model_id: &str) -> EmbedResult<Arc<Self>> {
        let (store, outcome) = Store::open(path, capacity, dim, model_id)?;
        match outcome {
            OpenOutcome::Created => info!(%model_id, capacity, "created cache shard"),
            OpenOutcome::Reused => info!(%model_id, capacity, "reusing existing cache shard"),
            OpenOutcome::Invalidated { previous_model_id } => {
                info!(previous_model_id, %model_id, "cache shard invalidated by model change")
            }
        }

        let index = DashMap::new();
        for (fp, idx, _record) in store.scan_live_entries() {
            index.insert(fp, idx);
        }
        let raw = store.raw_view();

        Ok(Arc::new(Self {
            store: Mutex::new(store),
            raw,
            index,
            flight: SingleFlight::new(),
            capacity,
        }))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Lock-free lookup: the index, the entry record, and the vector
    /// bytes are all read without taking `store`'s lock, since a slot's
    /// vector offset never changes once published. Hit-count and
    /// last-accessed bookkeeping are a best-effort write that only runs
    /// when the lock is free, so a concurrent publish or eviction never
    /// makes a reader wait.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<EmbeddingVector> {
        let idx = *self.index.get(fingerprint)?;
        let record = self.raw.read_entry(idx);
        if !record.is_live() {
            // Entry was evicted between the index read and this read;
            // treat as a miss rather than surfacing a torn read.
            return None;
        }
        let raw = self.raw.read_vector(crate::layout::VectorSlot(record.vector_slot));

        if let Some(mut store) = self.store.try_lock() {
            store.bump_hit_count(idx);
            store.touch_last_accessed(idx, now_millis());
        }

        debug!(fingerprint = %fingerprint, "cache hit");
        Some(EmbeddingVector::from_validated(raw))
    }

    /// Reserve the right to compute `fingerprint`'s embedding, or join an
    /// in-flight computation for it already owned by another caller.
    pub fn reserve(&self, fingerprint: Fingerprint) -> EmbedResult<ReserveOutcome> {
        if let Some(vector) = self.get(&fingerprint) {
            // A concurrent publish landed between the caller's own `get`
            // and this `reserve`; hand back the value as a completed wait
            // rather than forcing a redundant compute.
            let (tx, rx) = tokio::sync::watch::channel(Some(Ok(vector)));
            drop(tx);
            return Ok(ReserveOutcome::Waiting(Waiter::from_resolved(rx)));
        }

        match self.flight.reserve(fingerprint) {
            Reservation::Waiting(w) => Ok(ReserveOutcome::Waiting(w)),
            Reservation::ToCompute(flight_token) => {
                let mut store = self.store.lock();
                let entry_idx = match store.alloc_entry_index() {
                    Some(idx) => idx,
                    None => {
                        let victim = store.least_recently_used();
                        match victim {
                            Some((idx, victim_fp)) => {
                                self.evict_locked(&mut store, idx, &victim_fp);
                                store.alloc_entry_index().ok_or_else(|| {
                                    EmbedError::internal("no free entry slot after eviction")
                                })?
                            }
                            None => {
                                return Err(EmbedError::StorageFull {
                                    message: "cache at capacity with no evictable entry".into(),
                                });
                            }
                        }
                    }
                };
                Ok(ReserveOutcome::ToCompute(ReserveToken {
                    flight: flight_token,
                    entry_idx,
                }))
            }
        }
    }

    /// Publish a computed vector, making it visible to subsequent `Get`
    /// calls. Write order: vector bytes, key bytes, entry tuple, live
    /// count, header flush — each step only becomes visible to readers
    /// once the index insert below runs.
    pub fn publish(&self, token: ReserveToken, vector: EmbeddingVector) {
        let fingerprint = token.fingerprint();
        let entry_idx = token.entry_idx;
        {
            let mut store = self.store.lock();
            let slot = store.alloc_vector_slot();
            store.write_vector(slot, vector.as_slice());
            store.write_key(entry_idx, &fingerprint);
            store.write_entry(
                entry_idx,
                crate::layout::EntryRecord {
                    vector_slot: slot.0,
                    created_at: now_millis(),
                    hit_count: 0,
                    last_accessed: now_millis(),
                },
            );
            store.increment_live_count();
        }
        self.index.insert(fingerprint, entry_idx);
        token.flight.publish(vector, &self.flight);
    }

    /// Abandon a reservation: the allocated entry slot is returned to the
    /// free list and every waiter observes `error`.
    pub fn abandon(&self, token: ReserveToken, error: EmbedError) {
        {
            let mut store = self.store.lock();
            store.free_entry_index(token.entry_idx);
        }
        token.flight.abandon(error, &self.flight);
    }

    fn evict_locked(&self, store: &mut Store, idx: EntryIndex, fingerprint: &Fingerprint) {
        let record = store.read_entry(idx);
        store.clear_entry(idx);
        store.clear_key(idx);
        store.free_entry_index(idx);
        store.free_vector_slot(crate::layout::VectorSlot(record.vector_slot));
        store.decrement_live_count();
        self.index.remove(fingerprint);
        debug!(fingerprint = %fingerprint, "evicted least-recently-used entry");
    }

    /// Persist the vector-slot free list so a restart doesn't lose bump
    /// allocator state. Call on graceful shutdown.
    pub fn persist(&self) {
        self.store.lock().persist_freelist();
    }
}
