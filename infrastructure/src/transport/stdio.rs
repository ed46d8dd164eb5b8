//! Subprocess stdio transport.
//!
//! Spawns the provider as a child process and exchanges newline-delimited
//! JSON: one JSON-RPC message per line on stdin/stdout, UTF-8. stderr is
//! drained to the log for diagnostics and never interpreted. The child's
//! lifetime is owned by the transport: `disconnect` closes stdin, waits a
//! grace period for a voluntary exit, then force-kills.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use super::{IncomingFrames, Transport, TransportError};

/// How long `disconnect` waits for a voluntary exit before force-killing.
const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(3);

struct Running {
    child: Child,
    stdin: BufWriter<ChildStdin>,
}

/// Transport speaking newline-delimited JSON-RPC to a child process.
pub struct StdioTransport {
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    kill_grace: Duration,
    running: Mutex<Option<Running>>,
}

impl StdioTransport {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: HashMap::new(),
            kill_grace: DEFAULT_KILL_GRACE,
            running: Mutex::new(None),
        }
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn connect(&self) -> Result<IncomingFrames, TransportError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(TransportError::Connect("already connected".into()));
        }

        debug!(command = %self.command, "Spawning provider process");
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TransportError::Connect(format!("{}: {}", self.command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Connect("failed to capture stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Connect("failed to capture stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| TransportError::Connect("failed to capture stderr".into()))?;

        let (tx, rx) = mpsc::unbounded_channel();

        // Reader task — sole owner of stdout. One line = one frame.
        let command = self.command.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        debug!(command = %command, "Provider stdout closed");
                        let _ = tx.send(Err(TransportError::ConnectionLost(
                            "provider process closed its stdout".into(),
                        )));
                        break;
                    }
                    Ok(_) => {
                        let frame = line.trim();
                        if !frame.is_empty() {
                            let _ = tx.send(Ok(frame.to_string()));
                        }
                    }
                    Err(e) => {
                        warn!(command = %command, error = %e, "Provider stdout read failed");
                        let _ = tx.send(Err(TransportError::ConnectionLost(e.to_string())));
                        break;
                    }
                }
            }
        });

        // stderr is diagnostics only.
        let command = self.command.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stderr);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => debug!(command = %command, stderr = %line.trim_end(), "provider"),
                }
            }
        });

        *running = Some(Running {
            child,
            stdin: BufWriter::new(stdin),
        });
        Ok(rx)
    }

    async fn send(&self, frame: &str) -> Result<(), TransportError> {
        let mut running = self.running.lock().await;
        let Some(run) = running.as_mut() else {
            return Err(TransportError::Closed);
        };

        let write = async {
            run.stdin.write_all(frame.as_bytes()).await?;
            run.stdin.write_all(b"\n").await?;
            run.stdin.flush().await
        };
        write.await.map_err(|e| {
            warn!(error = %e, "Provider stdin write failed");
            TransportError::Send(e.to_string())
        })
    }

    async fn disconnect(&self) {
        let Some(mut run) = self.running.lock().await.take() else {
            return;
        };

        // Closing stdin asks the child to exit; escalate if it does not.
        drop(run.stdin);
        match tokio::time::timeout(self.kill_grace, run.child.wait()).await {
            Ok(Ok(status)) => debug!(?status, "Provider process exited"),
            Ok(Err(e)) => warn!(error = %e, "Failed to reap provider process"),
            Err(_) => {
                warn!(grace = ?self.kill_grace, "Provider unresponsive, force-killing");
                let _ = run.child.start_kill();
                let _ = run.child.wait().await;
            }
        }
    }
}
