//! Exercises the worker lifecycle against a fake worker implemented as a
//! shell script, the same pipe-driven style used to test an interactive
//! shell binary elsewhere in the corpus this crate draws from.

use std::io::Write;
use std::time::Duration;

use embed_worker::protocol::BatchOutcome;
use embed_worker::Worker;

/// Writes a tiny POSIX shell script that answers `init` with
/// `init_complete` and any `embed_batch` with a fixed one-vector `ok`
/// outcome, then returns the `sh -c '...'` command line to run it.
fn fake_worker_command(dir: &std::path::Path) -> String {
    let script_path = dir.join("fake_worker.sh");
    let script = r#"#!/bin/sh
while IFS= read -r line; do
  case "$line" in
    *'"init"'*)
      echo '{"type":"init_complete","model_id":"m","dim":2}'
      ;;
    *'"embed_batch"'*)
      echo '{"type":"embed_complete","request_id":0,"outcome":{"status":"ok","vectors":[[1.0,2.0]]}}'
      ;;
    *'"shutdown"'*)
      exit 0
      ;;
  esac
done
"#;
    let mut f = std::fs::File::create(&script_path).unwrap();
    f.write_all(script.as_bytes()).unwrap();
    drop(f);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    format!("sh {}", script_path.display())
}

#[tokio::test]
async fn worker_initializes_dispatches_and_shuts_down() {
    let dir = tempfile::tempdir().unwrap();
    let command = fake_worker_command(dir.path());

    let mut worker = Worker::spawn(0, &command, "m", 2, Duration::from_secs(5))
        .await
        .expect("worker should initialize");

    let outcome = worker
        .dispatch(
            vec!["hello".into()],
            Duration::from_secs(5),
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .await
        .expect("dispatch should succeed");

    match outcome {
        BatchOutcome::Ok { vectors } => {
            assert_eq!(vectors.len(), 1);
            assert_eq!(vectors[0], vec![1.0, 2.0]);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    worker.shutdown(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn init_timeout_is_reported_as_worker_crashed() {
    let dir = tempfile::tempdir().unwrap();
    // A script that never reads stdin nor replies: init should time out.
    let script_path = dir.path().join("silent.sh");
    std::fs::write(&script_path, "#!/bin/sh\nsleep 5\n").unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    let command = format!("sh {}", script_path.display());

    let result = Worker::spawn(0, &command, "m", 2, Duration::from_millis(200)).await;
    assert!(result.is_err());
}
