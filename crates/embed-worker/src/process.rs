//! Raw child-process plumbing: spawn, write one request line, stream
//! response lines back through a channel. No policy lives here — that is
//! [`crate::worker::Worker`]'s job.

use std::process::Stdio;

use embed_core::errors::{EmbedError, EmbedResult};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::protocol::{encode_request, decode_response, Request, Response};

pub struct ChildProcess {
    child: Child,
    stdin: ChildStdin,
    pub responses: mpsc::Receiver<Response>,
}

impl ChildProcess {
    /// Spawn `command` (split on whitespace; the first token is the
    /// program, the rest are fixed arguments) with piped stdin/stdout.
    /// Stderr is inherited so worker diagnostics land in the daemon's own
    /// logs without needing a second reader task.
    pub fn spawn(command: &str) -> EmbedResult<Self> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| EmbedError::internal("empty worker_command"))?;
        let args: Vec<&str> = parts.collect();

        let mut child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EmbedError::internal(format!("failed to spawn worker: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EmbedError::internal("worker child had no stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EmbedError::internal("worker child had no stdout"))?;

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(read_responses(stdout, tx));

        Ok(Self {
            child,
            stdin,
            responses: rx,
        })
    }

    pub async fn send(&mut self, req: &Request) -> EmbedResult<()> {
        let line = encode_request(req)
            .map_err(|e| EmbedError::internal(format!("failed to encode request: {e}")))?;
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| EmbedError::WorkerCrashed {
                message: format!("failed to write to worker stdin: {e}"),
            })?;
        Ok(())
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub async fn kill(&mut self) {
        let _ = self.child.kill().await;
    }

    /// Wait for the process to exit on its own, up to `budget`. Returns
    /// `true` if it exited within the budget.
    pub async fn wait_for_exit(&mut self, budget: std::time::Duration) -> bool {
        tokio::time::timeout(budget, self.child.wait()).await.is_ok()
    }
}

async fn read_responses(stdout: tokio::process::ChildStdout, tx: mpsc::Sender<Response>) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match decode_response(&line) {
                    Ok(resp) => {
                        if tx.send(resp).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, line, "worker sent unparseable response line"),
                }
            }
            Ok(None) => {
                debug!("worker stdout closed");
                break;
            }
            Err(e) => {
                warn!(error = %e, "error reading worker stdout");
                break;
            }
        }
    }
}
