//! Single-flight compute dedup: concurrent misses on the same fingerprint
//! collapse into one in-flight computation, with every other caller
//! suspending on the result rather than re-submitting work to the pool.

use dashmap::DashMap;
use embed_core::errors::EmbedError;
use embed_core::fingerprint::Fingerprint;
use embed_core::model::EmbeddingVector;
use tokio::sync::watch;

type SlotResult = Result<EmbeddingVector, EmbedError>;

struct Inflight {
    tx: watch::Sender<Option<SlotResult>>,
}

/// Tracks fingerprints currently being computed by some caller.
#[derive(Default)]
pub struct SingleFlight {
    inflight: DashMap<Fingerprint, Inflight>,
}

/// What [`SingleFlight::reserve`] handed back for one fingerprint.
pub enum Reservation {
    /// This caller is now responsible for computing the value and must
    /// call exactly one of [`ReserveToken::publish`] or
    /// [`ReserveToken::abandon`].
    ToCompute(ReserveToken),
    /// Another caller already owns the computation; await it here.
    Waiting(Waiter),
}

pub struct ReserveToken {
    fingerprint: Fingerprint,
    tx: watch::Sender<Option<SlotResult>>,
    resolved: bool,
}

pub struct Waiter {
    rx: watch::Receiver<Option<SlotResult>>,
}

impl Waiter {
    /// Wrap an already-resolved receiver. Used when the cache discovers a
    /// value was published between a caller's `get` and `reserve`, so
    /// there is no real in-flight computation to join.
    pub(crate) fn from_resolved(rx: watch::Receiver<Option<SlotResult>>) -> Self {
        Self { rx }
    }

    pub async fn await_result(mut self) -> SlotResult {
        loop {
            if let Some(r) = self.rx.borrow().clone() {
                return r;
            }
            if self.rx.changed().await.is_err() {
                // sender dropped without resolving: owner panicked or was
                // cancelled before publish/abandon ran.
                return Err(EmbedError::Cancelled);
            }
        }
    }
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the right to compute `fingerprint`, or join an existing
    /// in-flight computation for it.
    pub fn reserve(&self, fingerprint: Fingerprint) -> Reservation {
        if let Some(existing) = self.inflight.get(&fingerprint) {
            return Reservation::Waiting(Waiter {
                rx: existing.tx.subscribe(),
            });
        }
        // Race window: two callers may both miss the `get` above and both
        // attempt `entry().or_insert_with`, but `DashMap::entry` locks the
        // shard for the duration of the closure, so only one wins.
        let mut outcome = None;
        self.inflight.entry(fingerprint).or_insert_with(|| {
            let (tx, _rx) = watch::channel(None);
            outcome = Some(Reservation::ToCompute(ReserveToken {
                fingerprint,
                tx: tx.clone(),
                resolved: false,
            }));
            Inflight { tx }
        });
        match outcome {
            Some(r) => r,
            None => {
                // Another caller's entry won the race; join it instead.
                let existing = self.inflight.get(&fingerprint).expect("just inserted or raced");
                Reservation::Waiting(Waiter {
                    rx: existing.tx.subscribe(),
                })
            }
        }
    }
}

impl ReserveToken {
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn publish(mut self, vector: EmbeddingVector, flight: &SingleFlight) {
        self.resolved = true;
        let _ = self.tx.send(Some(Ok(vector)));
        flight.inflight.remove(&self.fingerprint);
    }

    pub fn abandon(mut self, error: EmbedError, flight: &SingleFlight) {
        self.resolved = true;
        let _ = self.tx.send(Some(Err(error)));
        flight.inflight.remove(&self.fingerprint);
    }
}

impl Drop for ReserveToken {
    fn drop(&mut self) {
        if !self.resolved {
            // Owner was dropped (panic, cancellation) without resolving.
            // Wake waiters with `Cancelled` instead of leaving them hung
            // forever on a channel whose sender will never send again.
            let _ = self.tx.send(Some(Err(EmbedError::Cancelled)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embed_core::constants::DIM;
    use embed_core::fingerprint::fingerprint;

    fn vec_of(n: f32) -> EmbeddingVector {
        let mut v = vec![0.0f32; DIM];
        v[0] = n;
        EmbeddingVector::new(v).unwrap()
    }

    #[test]
    fn first_reserve_is_to_compute() {
        let flight = SingleFlight::new();
        let fp = fingerprint("a").unwrap();
        match flight.reserve(fp) {
            Reservation::ToCompute(_) => {}
            Reservation::Waiting(_) => panic!("expected ToCompute"),
        }
    }

    #[tokio::test]
    async fn second_reserve_waits_then_sees_published_value() {
        let flight = SingleFlight::new();
        let fp = fingerprint("a").unwrap();
        let token = match flight.reserve(fp) {
            Reservation::ToCompute(t) => t,
            _ => panic!("expected ToCompute"),
        };
        let waiter = match flight.reserve(fp) {
            Reservation::Waiting(w) => w,
            _ => panic!("expected Waiting"),
        };
        token.publish(vec_of(1.0), &flight);
        let result = waiter.await_result().await.unwrap();
        assert_eq!(result.as_slice()[0], 1.0);
    }

    #[tokio::test]
    async fn dropped_token_without_resolution_cancels_waiters() {
        let flight = SingleFlight::new();
        let fp = fingerprint("a").unwrap();
        let token = match flight.reserve(fp) {
            Reservation::ToCompute(t) => t,
            _ => panic!("expected ToCompute"),
        };
        let waiter = match flight.reserve(fp) {
            Reservation::Waiting(w) => w,
            _ => panic!("expected Waiting"),
        };
        drop(token);
        let result = waiter.await_result().await;
        assert!(matches!(result, Err(EmbedError::Cancelled)));
    }

    #[test]
    fn reserving_again_after_publish_starts_fresh() {
        let flight = SingleFlight::new();
        let fp = fingerprint("a").unwrap();
        let token = match flight.reserve(fp) {
            Reservation::ToCompute(t) => t,
            _ => panic!("expected ToCompute"),
        };
        token.publish(vec_of(1.0), &flight);
        match flight.reserve(fp) {
            Reservation::ToCompute(_) => {}
            Reservation::Waiting(_) => panic!("expected a fresh ToCompute after resolution"),
        }
    }
}
