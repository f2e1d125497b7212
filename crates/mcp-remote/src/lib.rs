//! The remote-subprocess backend (spec.md §4.5): owns a child process
//! spawned with a strict env allowlist, speaks the JSON-RPC/JSONL wire
//! format toward it, and applies the single-retry reconnect policy.
#![deny(unsafe_code)]

mod token_cache;
mod url;

pub use token_cache::{evict_token_cache, md5_hex, ReauthSummary};
pub use url::extract_remote_url;

use mcp_core::ToolDescriptor;
use mcp_protocol::{Envelope, JsonlCodec, ProtocolError, RpcId};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::io::BufReader;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

const CONNECT_DEADLINE: Duration = Duration::from_secs(30);
const RECONNECT_DEADLINE: Duration = Duration::from_secs(10);
const REAUTH_DEADLINE: Duration = Duration::from_secs(120);

/// Environment variable names forwarded to the child regardless of
/// `extra_env` (spec.md §4.5 "a strict env allowlist").
const ENV_ALLOWLIST: &[&str] = &[
    "PATH",
    "HOME",
    "TMPDIR",
    "TEMP",
    "TMP",
    "HTTP_PROXY",
    "HTTPS_PROXY",
    "NO_PROXY",
    "http_proxy",
    "https_proxy",
    "no_proxy",
    "SSL_CERT_FILE",
    "SSL_CERT_DIR",
    "NODE_EXTRA_CA_CERTS",
];

/// Spawn configuration for the remote child process (spec.md §3
/// "Backend connection").
#[derive(Debug, Clone)]
pub struct RemoteSpec {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub extra_env: BTreeMap<String, String>,
    pub default_url: Option<String>,
    pub token_cache_dir: PathBuf,
}

impl RemoteSpec {
    #[must_use]
    pub fn remote_url(&self) -> Option<String> {
        extract_remote_url(&self.command, &self.args, self.default_url.as_deref())
    }

    fn build_env(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        for key in ENV_ALLOWLIST {
            if let Ok(value) = std::env::var(key) {
                env.insert((*key).to_string(), value);
            }
        }
        env.extend(self.extra_env.clone());
        env
    }
}

/// Errors from the remote backend (spec.md §7 `TransientBackendFailure` /
/// `PermanentBackendUnavailable`, caught at C6).
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("failed to spawn remote backend: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("remote backend wire protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("remote backend call failed: {0}")]
    Rpc(String),
    #[error("connect to remote backend timed out after {0:?}")]
    ConnectTimeout(Duration),
    #[error("remote backend call failed ({original}); reconnect also failed: {reconnect}")]
    ReconnectFailed { original: String, reconnect: String },
    #[error("remote backend is not connected")]
    NotConnected,
}

impl RemoteError {
    /// Classify this error by the spec.md §7 taxonomy.
    #[must_use]
    pub fn category(&self) -> mcp_error::ErrorCode {
        use mcp_error::ErrorCode;
        match self {
            Self::ConnectTimeout(_) => ErrorCode::BackendTimeout,
            Self::ReconnectFailed { .. } | Self::NotConnected => ErrorCode::BackendUnavailable,
            Self::Spawn(_) | Self::Protocol(_) | Self::Rpc(_) => ErrorCode::BackendTransientFailure,
        }
    }
}

impl From<&RemoteError> for mcp_error::McpError {
    fn from(err: &RemoteError) -> Self {
        mcp_error::McpError::new(err.category(), err.to_string())
    }
}

struct Connected {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    tools: Vec<ToolDescriptor>,
}

/// A connected-or-not handle onto the remote subprocess backend. Owns the
/// transport; `call_tool` applies the hard single-retry-reconnect
/// invariant internally and never retries beyond it.
pub struct RemoteBackend {
    spec: RemoteSpec,
    inner: Mutex<Option<Connected>>,
    next_id: AtomicI64,
}

impl RemoteBackend {
    #[must_use]
    pub fn new(spec: RemoteSpec) -> Self {
        Self {
            spec,
            inner: Mutex::new(None),
            next_id: AtomicI64::new(1),
        }
    }

    /// Spawn the child, connect, and `list_tools` once — bounded by the
    /// 30-second connect deadline (spec.md §4.5 "Connect").
    pub async fn connect(&self) -> Result<(), RemoteError> {
        let mut guard = self.inner.lock().await;
        let connected = tokio::time::timeout(CONNECT_DEADLINE, Self::spawn_and_list(&self.spec))
            .await
            .map_err(|_| RemoteError::ConnectTimeout(CONNECT_DEADLINE))??;
        *guard = Some(connected);
        Ok(())
    }

    #[must_use]
    pub async fn is_connected(&self) -> bool {
        self.inner.lock().await.is_some()
    }

    /// Cached tool descriptors from the last successful connect.
    pub async fn tools(&self) -> Vec<ToolDescriptor> {
        self.inner
            .lock()
            .await
            .as_ref()
            .map(|c| c.tools.clone())
            .unwrap_or_default()
    }

    async fn spawn_and_list(spec: &RemoteSpec) -> Result<Connected, RemoteError> {
        let mut cmd = Command::new(&spec.command);
        cmd.args(&spec.args)
            .env_clear()
            .envs(spec.build_env())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(RemoteError::Spawn)?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| RemoteError::Spawn(std::io::Error::other("stdin unavailable")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RemoteError::Spawn(std::io::Error::other("stdout unavailable")))?;
        let mut stdout = BufReader::new(stdout);

        let id = RpcId::Number(0);
        let request = Envelope::request(id.clone(), "tools/list", None);
        JsonlCodec::write_envelope(&mut stdin, &request).await?;

        let result = Self::await_response(&mut stdout, &id).await?;
        let tools: Vec<ToolDescriptor> = result
            .get("tools")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e: serde_json::Error| RemoteError::Rpc(e.to_string()))?
            .unwrap_or_default();

        Ok(Connected {
            child,
            stdin,
            stdout,
            tools,
        })
    }

    async fn await_response(
        stdout: &mut BufReader<ChildStdout>,
        id: &RpcId,
    ) -> Result<Value, RemoteError> {
        loop {
            let envelope = JsonlCodec::read_envelope(stdout).await?;
            if let Envelope::Response {
                id: response_id,
                result,
                error,
                ..
            } = envelope
            {
                if &response_id != id {
                    continue;
                }
                if let Some(err) = error {
                    return Err(RemoteError::Rpc(err.message));
                }
                return Ok(result.unwrap_or(Value::Null));
            }
        }
    }

    fn next_request_id(&self) -> RpcId {
        RpcId::Number(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Disconnect from the remote backend, killing the child process if
    /// one is running (spec.md §5 "on SIGINT/SIGTERM the router tears
    /// down both backends before exit").
    pub async fn disconnect(&self) {
        self.teardown().await;
    }

    async fn teardown(&self) {
        let mut guard = self.inner.lock().await;
        if let Some(mut connected) = guard.take() {
            let _ = connected.child.kill().await;
            let _ = connected.child.wait().await;
        }
    }

    async fn try_call_once(&self, name: &str, args: &Value) -> Result<mcp_core::ToolResult, RemoteError> {
        let id = self.next_request_id();
        let mut guard = self.inner.lock().await;
        let connected = guard.as_mut().ok_or(RemoteError::NotConnected)?;

        let params = serde_json::json!({ "name": name, "arguments": args });
        let request = Envelope::request(id.clone(), "tools/call", Some(params));
        JsonlCodec::write_envelope(&mut connected.stdin, &request).await?;
        let result = Self::await_response(&mut connected.stdout, &id).await?;
        serde_json::from_value(result).map_err(|e| RemoteError::Rpc(e.to_string()))
    }

    /// Forward a `call_tool` to the child, applying the hard
    /// single-retry-reconnect invariant on any transport failure
    /// (spec.md §4.5 "Call tool").
    pub async fn call_tool(&self, name: &str, args: Value) -> Result<mcp_core::ToolResult, RemoteError> {
        match self.try_call_once(name, &args).await {
            Ok(result) => Ok(result),
            Err(original) => {
                tracing::warn!(error = %original, tool = name, "remote call failed, attempting single reconnect+retry");
                self.teardown().await;

                let reconnect = tokio::time::timeout(
                    RECONNECT_DEADLINE,
                    Self::spawn_and_list(&self.spec),
                )
                .await;

                let connected = match reconnect {
                    Ok(Ok(connected)) => connected,
                    Ok(Err(reconnect_err)) => {
                        return Err(RemoteError::ReconnectFailed {
                            original: original.to_string(),
                            reconnect: reconnect_err.to_string(),
                        });
                    }
                    Err(_) => {
                        return Err(RemoteError::ReconnectFailed {
                            original: original.to_string(),
                            reconnect: format!("timed out after {RECONNECT_DEADLINE:?}"),
                        });
                    }
                };

                {
                    let mut guard = self.inner.lock().await;
                    *guard = Some(connected);
                }

                self.try_call_once(name, &args).await
            }
        }
    }

    /// Disconnect, evict token-cache files for this remote's URL, and
    /// reconnect under the extended 120-second reauth deadline (spec.md
    /// §4.5 "Reauth").
    pub async fn reauth(&self) -> ReauthSummary {
        self.teardown().await;

        let url = self.spec.remote_url().unwrap_or_default();
        let mut summary = evict_token_cache(&self.spec.token_cache_dir, &url);

        let reconnect = tokio::time::timeout(REAUTH_DEADLINE, Self::spawn_and_list(&self.spec)).await;
        match reconnect {
            Ok(Ok(connected)) => {
                let mut guard = self.inner.lock().await;
                *guard = Some(connected);
            }
            Ok(Err(err)) => {
                summary.status = "reauth_failed";
                summary.message = format!("{} (reconnect failed: {err})", summary.message);
            }
            Err(_) => {
                summary.status = "reauth_failed";
                summary.message = format!(
                    "{} (reconnect timed out after {REAUTH_DEADLINE:?})",
                    summary.message
                );
            }
        }
        summary
    }
}
