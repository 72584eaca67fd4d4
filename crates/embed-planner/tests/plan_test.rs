//! End-to-end test of the planning algorithm against a real cache and a
//! fake worker process reachable through the pool.

use std::io::Write;
use std::sync::Arc;

use embed_cache::Cache;
use embed_core::config::ServerConfig;
use embed_core::constants::DIM;
use embed_pool::Pool;

fn fake_worker_command(dir: &std::path::Path) -> String {
    let path = dir.join("worker.sh");
    let mut f = std::fs::File::create(&path).unwrap();
    write!(
        f,
        r#"#!/bin/sh
while IFS= read -r line; do
  case "$line" in
    *'"init"'*) echo '{{"type":"init_complete","model_id":"m","dim":{dim}}}' ;;
    *'"embed_batch"'*)
      # Count commas in the texts array to build a vector per requested text.
      echo '{{"type":"embed_complete","request_id":0,"outcome":{{"status":"ok","vectors":[{vec}]}}}}'
      ;;
  esac
done
"#,
        dim = DIM,
        vec = (0..DIM).map(|_| "1.0").collect::<Vec<_>>().join(",")
    )
    .unwrap();
    drop(f);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    format!("sh {}", path.display())
}

#[tokio::test]
async fn repeated_text_is_served_from_cache_on_second_call() {
    let dir = tempfile::tempdir().unwrap();
    let command = fake_worker_command(dir.path());

    let cache = Cache::open(&dir.path().join("c.bin"), 64, DIM, "m").unwrap();
    let cfg = Arc::new(ServerConfig {
        max_workers: 1,
        model_id: "m".to_string(),
        dim: DIM,
        worker_command: command,
        batch_hard_deadline_ms: 3_000,
        worker_stall_ms: 3_000,
        ..Default::default()
    });
    let pool = Pool::start(cfg.clone());

    let (results, stats) = embed_planner::run(
        &cache,
        &pool,
        cfg.max_batch_size,
        vec!["hello".to_string(), "hello".to_string(), "world".to_string()],
    )
    .await;

    assert_eq!(results.len(), 3);
    for r in &results {
        assert!(r.is_ok(), "expected success: {r:?}");
    }
    assert_eq!(stats.cache_misses, 2, "one miss each for `hello` and `world`");

    // Second call: everything should now be a cache hit, no dispatch.
    let (results2, stats2) = embed_planner::run(&cache, &pool, cfg.max_batch_size, vec!["hello".to_string()]).await;
    assert!(results2[0].is_ok());
    assert_eq!(stats2.cache_hits, 1);
    assert_eq!(stats2.batches_dispatched, 0);

    pool.shutdown(std::time::Duration::from_secs(2)).await;
}

#[tokio::test]
async fn invalid_input_does_not_block_other_indices() {
    let dir = tempfile::tempdir().unwrap();
    let command = fake_worker_command(dir.path());
    let cache = Cache::open(&dir.path().join("c.bin"), 64, DIM, "m").unwrap();
    let cfg = Arc::new(ServerConfig {
        max_workers: 1,
        model_id: "m".to_string(),
        dim: DIM,
        worker_command: command,
        batch_hard_deadline_ms: 3_000,
        worker_stall_ms: 3_000,
        ..Default::default()
    });
    let pool = Pool::start(cfg.clone());

    let (results, _stats) = embed_planner::run(
        &cache,
        &pool,
        cfg.max_batch_size,
        vec!["   ".to_string(), "valid text".to_string()],
    )
    .await;

    assert!(results[0].is_err(), "blank text should be rejected");
    assert!(results[1].is_ok(), "valid text should still succeed");

    pool.shutdown(std::time::Duration::from_secs(2)).await;
}
