//! Tool server connection (spawn, handshake, calls, teardown).

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::launch::LaunchPlan;
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, RequestId, Tool,
};

/// Deadline for a single request/response exchange with the peer.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Maximum response frame size (1 MiB).
/// Sized for large tool outputs (file reads, search results).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// The owned channel to a live child process. Taken exactly once on close.
struct Channel {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// A connection to a spawned tool server.
///
/// All operations take `&mut self`: one request/response exchange at a time,
/// enforced by the borrow rather than an internal lock. `close` is idempotent
/// and releases the pipes and the child exactly once; `kill_on_drop` covers
/// any path that never reaches it.
pub struct Connection {
    channel: Option<Channel>,
    next_id: i64,
    initialized: bool,
}

impl Connection {
    /// Spawn the tool server described by `plan` and open its stdio channel.
    ///
    /// The handshake is not performed here; call [`initialize`] next.
    ///
    /// [`initialize`]: Connection::initialize
    pub async fn open(plan: &LaunchPlan) -> Result<Self> {
        let mut child = Command::new(&plan.command)
            .args(&plan.args)
            .envs(&plan.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(Error::Spawn)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdin")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdout")))?;

        Ok(Self {
            channel: Some(Channel {
                child,
                stdin,
                stdout: BufReader::new(stdout),
            }),
            next_id: 1,
            initialized: false,
        })
    }

    /// Perform the startup handshake.
    ///
    /// Fails if the peer does not acknowledge within [`REQUEST_TIMEOUT`] or
    /// returns a malformed acknowledgment. Must complete before
    /// [`list_tools`] or [`call_tool`].
    ///
    /// [`list_tools`]: Connection::list_tools
    /// [`call_tool`]: Connection::call_tool
    pub async fn initialize(&mut self) -> Result<()> {
        let ack: InitializeResult = self
            .request("initialize", Some(InitializeParams::default()))
            .await
            .map_err(|e| match e {
                Error::PeerUnresponsive(d) => {
                    Error::Handshake(format!("peer did not acknowledge initialize within {d:?}"))
                }
                Error::InvalidResponse(msg) => {
                    Error::Handshake(format!("malformed initialize acknowledgment: {msg}"))
                }
                Error::Rpc(err) => Error::Handshake(format!("peer rejected initialize: {err}")),
                other => other,
            })?;

        tracing::debug!(
            server = %ack.server_info.name,
            protocol = %ack.protocol_version,
            "tool server initialized"
        );

        self.notify("notifications/initialized").await?;
        self.initialized = true;
        Ok(())
    }

    /// Query the peer for its tool set.
    pub async fn list_tools(&mut self) -> Result<Vec<Tool>> {
        self.ensure_initialized()?;
        let result: ListToolsResult = self.request("tools/list", None::<()>).await?;
        Ok(result.tools)
    }

    /// Invoke one tool and wait for its result.
    ///
    /// A peer-reported failure surfaces as [`Error::ToolCallFailed`] carrying
    /// the peer's error payload; a channel severed mid-call surfaces as
    /// [`Error::PeerClosed`].
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<CallToolResult> {
        self.ensure_initialized()?;

        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        let result: CallToolResult = self.request("tools/call", Some(params)).await?;

        if result.is_error {
            return Err(Error::ToolCallFailed(result.text()));
        }
        Ok(result)
    }

    /// Whether the channel is still open.
    pub fn is_open(&self) -> bool {
        self.channel.is_some()
    }

    /// Release the channel and terminate the child process.
    ///
    /// Idempotent: the second and later calls are no-ops, and an
    /// already-exited child is not re-killed. Closing stdin first gives a
    /// well-behaved server the chance to exit on EOF before the kill.
    pub async fn close(&mut self) {
        self.initialized = false;
        if let Some(mut channel) = self.channel.take() {
            drop(channel.stdin);
            if let Ok(Some(_)) = channel.child.try_wait() {
                return; // already exited, nothing to kill
            }
            if let Err(e) = channel.child.kill().await {
                tracing::debug!(error = %e, "tool server already gone at close");
            }
        }
    }

    // --- Internal ---

    fn ensure_initialized(&self) -> Result<()> {
        if self.channel.is_none() {
            return Err(Error::Closed);
        }
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        Ok(())
    }

    fn next_request_id(&mut self) -> RequestId {
        let id = self.next_id;
        self.next_id += 1;
        RequestId::Number(id)
    }

    async fn request<P, R>(&mut self, method: &str, params: Option<P>) -> Result<R>
    where
        P: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        let id = self.next_request_id();
        let mut request = JsonRpcRequest::new(id.clone(), method);
        if let Some(p) = params {
            request = request.with_params(p);
        }
        let frame = serde_json::to_string(&request).map_err(Error::Encode)?;

        let channel = self.channel.as_mut().ok_or(Error::Closed)?;
        write_frame(&mut channel.stdin, &frame).await?;

        let response = timeout(REQUEST_TIMEOUT, read_response(&mut channel.stdout))
            .await
            .map_err(|_| Error::PeerUnresponsive(REQUEST_TIMEOUT))??;

        if response.id != id {
            return Err(Error::InvalidResponse(format!(
                "response ID mismatch: expected {id:?}, got {:?}",
                response.id
            )));
        }

        let result = response.into_result().map_err(Error::Rpc)?;
        serde_json::from_value(result).map_err(|e| Error::InvalidResponse(e.to_string()))
    }

    async fn notify(&mut self, method: &str) -> Result<()> {
        let frame = serde_json::to_string(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
        }))
        .map_err(Error::Encode)?;

        let channel = self.channel.as_mut().ok_or(Error::Closed)?;
        write_frame(&mut channel.stdin, &frame).await
    }
}

async fn write_frame(stdin: &mut ChildStdin, frame: &str) -> Result<()> {
    let write = async {
        stdin.write_all(frame.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await
    };
    write
        .await
        .map_err(|e| Error::PeerClosed(format!("write failed: {e}")))
}

/// Read frames until a response arrives.
///
/// Peer-initiated notifications (frames without an `id`) are skipped; only
/// an actual response terminates the loop.
async fn read_response(stdout: &mut BufReader<ChildStdout>) -> Result<JsonRpcResponse> {
    loop {
        let mut line = String::new();
        let bytes_read = stdout
            .read_line(&mut line)
            .await
            .map_err(|e| Error::PeerClosed(format!("read failed: {e}")))?;
        if bytes_read == 0 {
            return Err(Error::PeerClosed("channel closed mid-call".to_string()));
        }
        if line.len() > MAX_FRAME_SIZE {
            return Err(Error::FrameTooLarge {
                size: line.len(),
                max: MAX_FRAME_SIZE,
            });
        }
        if line.trim().is_empty() {
            continue;
        }

        let value: serde_json::Value = serde_json::from_str(&line)
            .map_err(|e| Error::InvalidResponse(format!("not valid JSON: {e}")))?;
        if value.get("id").is_none() {
            continue; // notification from the peer
        }
        return serde_json::from_value(value).map_err(|e| Error::InvalidResponse(e.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // `cat` gives us a spawnable child that holds its pipes open without
    // speaking the protocol; enough to exercise lifecycle edges.
    fn inert_plan() -> LaunchPlan {
        LaunchPlan::command("cat", vec![])
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let mut conn = Connection::open(&inert_plan()).await.unwrap();
        assert!(conn.is_open());

        conn.close().await;
        assert!(!conn.is_open());

        // Second close must not panic or attempt to re-kill.
        conn.close().await;
        assert!(!conn.is_open());
    }

    #[tokio::test]
    async fn operations_fail_fast_after_close() {
        let mut conn = Connection::open(&inert_plan()).await.unwrap();
        conn.close().await;

        assert!(matches!(conn.list_tools().await, Err(Error::Closed)));
        assert!(matches!(conn.call_tool("x", None).await, Err(Error::Closed)));
    }

    #[tokio::test]
    async fn calls_require_initialization() {
        let mut conn = Connection::open(&inert_plan()).await.unwrap();
        assert!(matches!(
            conn.list_tools().await,
            Err(Error::NotInitialized)
        ));
        conn.close().await;
    }

    #[tokio::test]
    async fn spawn_failure_reports_no_process() {
        let plan = LaunchPlan::command("courier-test-no-such-binary", vec![]);
        assert!(matches!(
            Connection::open(&plan).await,
            Err(Error::Spawn(_))
        ));
    }

    #[tokio::test]
    async fn handshake_fails_when_peer_closes_channel() {
        // `true` exits immediately; the initialize read hits EOF.
        let plan = LaunchPlan::command("true", vec![]);
        let mut conn = Connection::open(&plan).await.unwrap();
        let err = conn.initialize().await;
        assert!(matches!(err, Err(Error::PeerClosed(_))));
        conn.close().await;
    }
}
