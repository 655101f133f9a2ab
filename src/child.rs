//! Child Supervisor (spec §4.2).
//!
//! Spawns the configured command through a shell (so the command string is
//! parsed the way the host's shell would parse it), inheriting the
//! process environment. Exposes a line-oriented writer into the child's
//! stdin, a broadcast of `JsonRpcMessage`s framed off its stdout by the
//! `LineFramer`, and an exit-info channel any per-mode orchestrator logic
//! can await.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child as TokioChild, Command};
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{error, info, warn};

use crate::error::{TransportError, TransportResult};
use crate::framing::LineFramer;
use crate::jsonrpc::JsonRpcMessage;
use crate::observability::metrics::{
    record_child_exit, record_child_spawn, record_child_to_network, record_network_to_child, sanitize_method_label,
};

/// Exit status reported by a child process, decomposed the way a POSIX
/// shell would report it (`code`, `signal`) per spec §3/§4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Signal number that terminated the process (Unix only).
    pub signal: Option<i32>,
}

impl ExitInfo {
    /// The code to use as the whole bridge process's exit code in 1:1 SSE
    /// mode, per §4.2: the child's code, or 1 if unknown.
    #[must_use]
    pub fn process_exit_code(&self) -> i32 {
        self.code.unwrap_or(1)
    }

    fn from_status(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            signal: unix_signal(status),
        }
    }
}

#[cfg(unix)]
fn unix_signal(status: ExitStatus) -> Option<i32> {
    std::os::unix::process::ExitStatusExt::signal(&status)
}

#[cfg(not(unix))]
fn unix_signal(_status: ExitStatus) -> Option<i32> {
    None
}

/// A running stdio MCP server process.
///
/// Implements the `Child` entity from the data model (spec §3). Broadcast
/// fan-out lets several sessions (e.g. multiple SSE subscribers, or
/// multiple WebSocket peers on one binding) observe the same stdout
/// stream without the supervisor knowing how many are listening.
pub struct Child {
    inner: Arc<Mutex<TokioChild>>,
    stdin: Mutex<tokio::process::ChildStdin>,
    outbound: broadcast::Sender<JsonRpcMessage>,
    exit_rx: watch::Receiver<Option<ExitInfo>>,
}

impl Child {
    /// Spawns `command` through the host shell.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError::ConnectionFailed`] if the process
    /// cannot be spawned or its stdio pipes cannot be captured.
    pub fn spawn(command: &str) -> TransportResult<Self> {
        let mut cmd = shell_command(command);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| TransportError::ConnectionFailed(format!("spawn failed: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::ConnectionFailed("no stdin handle".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::ConnectionFailed("no stdout handle".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| TransportError::ConnectionFailed("no stderr handle".into()))?;

        let (outbound_tx, _) = broadcast::channel(1024);
        let (exit_tx, exit_rx) = watch::channel(None);

        let inner = Arc::new(Mutex::new(child));

        tokio::spawn(read_stdout(stdout, outbound_tx.clone()));
        tokio::spawn(read_stderr(stderr));
        tokio::spawn(wait_for_exit(Arc::clone(&inner), exit_tx));

        record_child_spawn();

        Ok(Self {
            inner,
            stdin: Mutex::new(stdin),
            outbound: outbound_tx,
            exit_rx,
        })
    }

    /// Serializes `message` and writes it as exactly one line to the
    /// child's stdin (spec §3 invariant: one JSON object plus one `\n`).
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if serialization or the write fails.
    pub async fn send(&self, message: &JsonRpcMessage) -> TransportResult<()> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(&line).await?;
        stdin.flush().await?;
        record_network_to_child(sanitize_method_label(message.method().unwrap_or("response")));
        Ok(())
    }

    /// Subscribes to every `JsonRpcMessage` the child writes to stdout
    /// from this point forward.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<JsonRpcMessage> {
        self.outbound.subscribe()
    }

    /// A receiver that resolves once the child has exited.
    #[must_use]
    pub fn exit_receiver(&self) -> watch::Receiver<Option<ExitInfo>> {
        self.exit_rx.clone()
    }

    /// True once the child has exited.
    #[must_use]
    pub fn has_exited(&self) -> bool {
        self.exit_rx.borrow().is_some()
    }

    /// Forcibly terminates the child process.
    pub async fn kill(&self) {
        let mut child = self.inner.lock().await;
        if let Err(e) = child.kill().await {
            warn!(error = %e, "failed to kill child (already exited?)");
        }
    }
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/c").arg(command);
    cmd
}

async fn read_stdout(stdout: tokio::process::ChildStdout, tx: broadcast::Sender<JsonRpcMessage>) {
    let mut reader = stdout;
    let mut framer = LineFramer::new();
    let mut buf = [0u8; 8192];
    loop {
        match tokio::io::AsyncReadExt::read(&mut reader, &mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                for message in framer.feed(&buf[..n]) {
                    record_child_to_network(sanitize_method_label(message.method().unwrap_or("response")));
                    // No subscribers is fine (e.g. the child wrote before
                    // anyone connected) — message is simply dropped.
                    let _ = tx.send(message);
                }
            }
            Err(e) => {
                error!(error = %e, "error reading child stdout");
                break;
            }
        }
    }
}

async fn read_stderr(stderr: tokio::process::ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => error!(target: "child_stderr", "{line}"),
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "error reading child stderr");
                break;
            }
        }
    }
}

async fn wait_for_exit(child: Arc<Mutex<TokioChild>>, tx: watch::Sender<Option<ExitInfo>>) {
    let status = {
        let mut guard = child.lock().await;
        guard.wait().await
    };
    match status {
        Ok(status) => {
            let info = ExitInfo::from_status(status);
            info!(?info, "child process exited");
            record_child_exit();
            let _ = tx.send(Some(info));
        }
        Err(e) => {
            error!(error = %e, "error waiting for child exit");
            record_child_exit();
            let _ = tx.send(Some(ExitInfo { code: None, signal: None }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn spawns_and_echoes_line() {
        let child = Child::spawn("cat").expect("spawn cat");
        let mut rx = child.subscribe();

        let msg = JsonRpcMessage::Request(crate::jsonrpc::JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: "ping".to_string(),
            params: None,
            id: json!(1),
        });
        child.send(&msg).await.unwrap();

        let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for echo")
            .expect("channel closed");
        assert_eq!(received.id(), Some(&json!(1)));

        child.kill().await;
    }

    #[tokio::test]
    async fn reports_exit_status() {
        let child = Child::spawn("exit 3").expect("spawn exit 3");
        let mut exit_rx = child.exit_receiver();
        tokio::time::timeout(Duration::from_secs(5), exit_rx.changed())
            .await
            .expect("timed out waiting for exit")
            .unwrap();
        let info = exit_rx.borrow().expect("exit info present");
        assert_eq!(info.code, Some(3));
        assert!(child.has_exited());
    }

    #[tokio::test]
    async fn kill_terminates_long_running_child() {
        let child = Child::spawn("sleep 60").expect("spawn sleep");
        child.kill().await;
        let mut exit_rx = child.exit_receiver();
        tokio::time::timeout(Duration::from_secs(5), exit_rx.changed())
            .await
            .expect("timed out waiting for kill to take effect")
            .unwrap();
    }
}
