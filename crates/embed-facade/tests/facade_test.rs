//! End-to-end tests of the facade against a real cache and a fake
//! worker process reachable through a real pool.

use std::io::Write;
use std::sync::Arc;

use embed_cache::Cache;
use embed_core::config::ServerConfig;
use embed_core::constants::DIM;
use embed_facade::{EmbedOptions, Facade};
use embed_pool::Pool;

fn vec_literal() -> String {
    (0..DIM).map(|_| "1.0").collect::<Vec<_>>().join(",")
}

/// A worker that always succeeds, reporting exactly as many vectors as
/// texts it was asked to embed (counted by `"` occurrences is too fragile,
/// so this script just always returns a fixed-size array generous enough
/// for every batch these tests submit).
fn steady_worker(dir: &std::path::Path) -> String {
    let path = dir.join("steady.sh");
    let mut f = std::fs::File::create(&path).unwrap();
    write!(
        f,
        r#"#!/bin/sh
while IFS= read -r line; do
  case "$line" in
    *'"init"'*) echo '{{"type":"init_complete","model_id":"m","dim":{dim}}}' ;;
    *'"embed_batch"'*)
      echo '{{"type":"embed_complete","request_id":0,"outcome":{{"status":"ok","vectors":[{v},{v},{v},{v}]}}}}'
      ;;
  esac
done
"#,
        dim = DIM,
        v = vec_literal()
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

/// A worker that reports the first batch as partial (dropping index 0),
/// then succeeds fully on every subsequent batch. Exercises the facade's
/// one-shot retry.
fn flaky_then_steady_worker(dir: &std::path::Path) -> String {
    let path = dir.join("flaky.sh");
    let counter = dir.join("flaky.count");
    std::fs::write(&counter, "0").unwrap();
    let mut f = std::fs::File::create(&path).unwrap();
    write!(
        f,
        r#"#!/bin/sh
COUNTER="{counter}"
while IFS= read -r line; do
  case "$line" in
    *'"init"'*) echo '{{"type":"init_complete","model_id":"m","dim":{dim}}}' ;;
    *'"embed_batch"'*)
      n=$(cat "$COUNTER")
      n=$((n + 1))
      echo "$n" > "$COUNTER"
      if [ "$n" -eq 1 ]; then
        echo '{{"type":"embed_complete","request_id":0,"outcome":{{"status":"partial","vectors":[null,[{v}]],"missing_indices":[0]}}}}'
      else
        echo '{{"type":"embed_complete","request_id":0,"outcome":{{"status":"ok","vectors":[{v}]}}}}'
      fi
      ;;
  esac
done
"#,
        dim = DIM,
        v = vec_literal(),
        counter = counter.display()
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

fn base_config(command: String) -> Arc<ServerConfig> {
    Arc::new(ServerConfig {
        max_workers: 1,
        max_batch_size: 4,
        model_id: "m".to_string(),
        dim: DIM,
        worker_command: command,
        batch_hard_deadline_ms: 3_000,
        worker_stall_ms: 3_000,
        ..Default::default()
    })
}

#[tokio::test]
async fn embeds_a_batch_successfully() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = base_config(steady_worker(dir.path()));
    let cache = Cache::open(&dir.path().join("c.bin"), 64, DIM, "m").unwrap();
    let pool = Pool::start(cfg.clone());
    let facade = Facade::new(cache, pool, cfg);

    let (vectors, stats) = facade
        .embed(
            vec!["alpha".to_string(), "beta".to_string()],
            EmbedOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(vectors.len(), 2);
    assert_eq!(stats.cache_misses, 2);
    assert_eq!(stats.retried_indices, 0);
    assert!(facade.drain_degradation_events().is_empty());

    facade.shutdown(std::time::Duration::from_secs(2)).await;
}

#[tokio::test]
async fn empty_call_returns_empty_without_touching_the_pool() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = base_config(steady_worker(dir.path()));
    let cache = Cache::open(&dir.path().join("c.bin"), 64, DIM, "m").unwrap();
    let pool = Pool::start(cfg.clone());
    let facade = Facade::new(cache, pool, cfg);

    let (vectors, stats) = facade.embed(Vec::new(), EmbedOptions::default()).await.unwrap();
    assert!(vectors.is_empty());
    assert_eq!(stats.cache_hits, 0);

    facade.shutdown(std::time::Duration::from_secs(2)).await;
}

#[tokio::test]
async fn retries_a_partial_batch_and_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = base_config(flaky_then_steady_worker(dir.path()));
    let cache = Cache::open(&dir.path().join("c.bin"), 64, DIM, "m").unwrap();
    let pool = Pool::start(cfg.clone());
    let facade = Facade::new(cache, pool, cfg);

    let (vectors, stats) = facade
        .embed(
            vec!["missing-first-time".to_string(), "present".to_string()],
            EmbedOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(vectors.len(), 2);
    assert_eq!(stats.retried_indices, 1);

    let events = facade.drain_degradation_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].fallback_used, "retry_succeeded");

    facade.shutdown(std::time::Duration::from_secs(2)).await;
}

#[tokio::test]
async fn invalid_input_is_reported_as_partial_without_a_retry() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = base_config(steady_worker(dir.path()));
    let cache = Cache::open(&dir.path().join("c.bin"), 64, DIM, "m").unwrap();
    let pool = Pool::start(cfg.clone());
    let facade = Facade::new(cache, pool, cfg);

    let err = facade
        .embed(vec!["   ".to_string(), "valid".to_string()], EmbedOptions::default())
        .await
        .unwrap_err();

    match err {
        embed_core::errors::EmbedError::Partial {
            missing_indices,
            missing_count,
            total,
        } => {
            assert_eq!(missing_indices, vec![0]);
            assert_eq!(missing_count, 1);
            assert_eq!(total, 2);
        }
        other => panic!("expected Partial, got {other:?}"),
    }
    assert!(facade.drain_degradation_events().is_empty(), "permanent failures are never retried");

    facade.shutdown(std::time::Duration::from_secs(2)).await;
}
