//! Exercises the pool's dispatch, crash-respawn, and drain behavior
//! against a fake worker process.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use embed_core::config::ServerConfig;
use embed_pool::{BatchRequest, Pool};
use embed_worker::BatchOutcome;

fn fake_worker_script(dir: &std::path::Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    write!(f, "#!/bin/sh\n{body}\n").unwrap();
    drop(f);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    format!("sh {}", path.display())
}

fn base_config(command: String) -> ServerConfig {
    ServerConfig {
        max_workers: 2,
        model_id: "m".to_string(),
        dim: 2,
        worker_command: command,
        batch_hard_deadline_ms: 3_000,
        worker_stall_ms: 3_000,
        ..Default::default()
    }
}

#[tokio::test]
async fn submits_dispatch_through_a_fake_worker() {
    let dir = tempfile::tempdir().unwrap();
    let command = fake_worker_script(
        dir.path(),
        "worker.sh",
        r#"while IFS= read -r line; do
  case "$line" in
    *'"init"'*) echo '{"type":"init_complete","model_id":"m","dim":2}' ;;
    *'"embed_batch"'*) echo '{"type":"embed_complete","request_id":0,"outcome":{"status":"ok","vectors":[[1.0,2.0]]}}' ;;
  esac
done"#,
    );

    let pool = Pool::start(Arc::new(base_config(command)));

    let (req, rx) = BatchRequest::new(vec!["hello".into()]);
    pool.submit(req).await.unwrap();

    let outcome = rx.await.unwrap().unwrap();
    match outcome {
        BatchOutcome::Ok { vectors } => assert_eq!(vectors, vec![vec![1.0, 2.0]]),
        other => panic!("unexpected outcome: {other:?}"),
    }

    pool.shutdown(Duration::from_secs(2)).await;
}

#[tokio::test]
async fn overloaded_queue_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    // A worker that inits fine but never answers embed_batch, so the
    // queue backs up behind the one in-flight request.
    let command = fake_worker_script(
        dir.path(),
        "worker.sh",
        r#"while IFS= read -r line; do
  case "$line" in
    *'"init"'*) echo '{"type":"init_complete","model_id":"m","dim":2}' ;;
  esac
done"#,
    );

    let mut cfg = base_config(command);
    cfg.max_workers = 1;
    cfg.queue_high_water = Some(1);
    cfg.worker_stall_ms = 200;
    cfg.batch_hard_deadline_ms = 200;
    let pool = Pool::start(Arc::new(cfg));

    let (req1, _rx1) = BatchRequest::new(vec!["a".into()]);
    pool.submit(req1).await.unwrap();

    // Give the one worker loop a moment to pick up req1 so the queue slot
    // frees, then fill it and overflow with a second submit.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let (req2, _rx2) = BatchRequest::new(vec!["b".into()]);
    pool.submit(req2).await.unwrap();
    let (req3, _rx3) = BatchRequest::new(vec!["c".into()]);
    let result = pool.submit(req3).await;
    assert!(matches!(result, Err(embed_core::errors::EmbedError::Overloaded { .. })));

    pool.shutdown(Duration::from_millis(500)).await;
}
