//! End-to-end tests exercising the cache through concurrent callers, the
//! way multiple in-flight HTTP requests would hit it in the server.

use std::sync::Arc;

use embed_cache::{Cache, ReserveOutcome};
use embed_core::constants::DIM;
use embed_core::fingerprint::fingerprint;
use embed_core::model::EmbeddingVector;

fn vec_of(n: f32) -> EmbeddingVector {
    let mut v = vec![0.0f32; DIM];
    v[0] = n;
    EmbeddingVector::new(v).unwrap()
}

#[tokio::test]
async fn concurrent_callers_on_same_text_single_flight() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Cache::open(&dir.path().join("shard.bin"), 64, DIM, "m").unwrap();
    let fp = fingerprint("shared text").unwrap();

    let mut compute_owners = 0;
    let mut waiters = Vec::new();

    for _ in 0..8 {
        match cache.reserve(fp).unwrap() {
            ReserveOutcome::ToCompute(token) => {
                compute_owners += 1;
                cache.publish(token, vec_of(42.0));
            }
            ReserveOutcome::Waiting(w) => waiters.push(w),
        }
    }

    assert_eq!(compute_owners, 1, "exactly one caller should have computed");
    for w in waiters {
        let v = w.await_result().await.unwrap();
        assert_eq!(v.as_slice()[0], 42.0);
    }
}

#[tokio::test]
async fn restart_preserves_published_entries_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shard.bin");

    {
        let cache = Cache::open(&path, 64, DIM, "m").unwrap();
        for i in 0..10 {
            let fp = fingerprint(&format!("text-{i}")).unwrap();
            let token = match cache.reserve(fp).unwrap() {
                ReserveOutcome::ToCompute(t) => t,
                ReserveOutcome::Waiting(_) => panic!("unexpected contention"),
            };
            cache.publish(token, vec_of(i as f32));
        }
        cache.persist();
    }

    let reopened = Cache::open(&path, 64, DIM, "m").unwrap();
    assert_eq!(reopened.len(), 10);
    for i in 0..10 {
        let fp = fingerprint(&format!("text-{i}")).unwrap();
        let hit = reopened.get(&fp).expect("entry should survive reopen");
        assert_eq!(hit.as_slice()[0], i as f32);
    }
}

#[tokio::test]
async fn eviction_keeps_the_most_recently_used_entries() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(Cache::open(&dir.path().join("shard.bin"), 4, DIM, "m").unwrap());

    for i in 0..4 {
        let fp = fingerprint(&format!("item-{i}")).unwrap();
        let token = match cache.reserve(fp).unwrap() {
            ReserveOutcome::ToCompute(t) => t,
            _ => panic!(),
        };
        cache.publish(token, vec_of(i as f32));
    }

    // Touch item-0 so it is no longer the least-recently-used entry.
    let fp0 = fingerprint("item-0").unwrap();
    assert!(cache.get(&fp0).is_some());

    // Inserting a 5th item must evict the LRU entry (item-1), not item-0.
    let fp_new = fingerprint("item-4").unwrap();
    let token = match cache.reserve(fp_new).unwrap() {
        ReserveOutcome::ToCompute(t) => t,
        _ => panic!(),
    };
    cache.publish(token, vec_of(4.0));

    assert!(cache.get(&fp0).is_some(), "recently touched entry should survive");
    assert_eq!(cache.len(), 4);
}
