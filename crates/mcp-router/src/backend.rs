//! The capability the router depends on: `{list_tools, call_tool, close}`,
//! not any particular backend's transport (spec.md §9 "keep the mode
//! information internal to the backend implementation").

use async_trait::async_trait;
use mcp_core::{ToolDescriptor, ToolResult};
use mcp_local::{CallContext, HttpClient, LocalBackend};
use mcp_remote::RemoteBackend;
use serde_json::Value;

/// A backend the router can list tools on and dispatch calls to.
#[async_trait]
pub trait Backend: Send + Sync {
    /// List the tools this backend currently exposes.
    async fn list_tools(&self) -> Vec<ToolDescriptor>;
    /// Dispatch a single call. Never panics; transport/protocol failures
    /// are folded into an error [`ToolResult`].
    async fn call_tool(&self, name: &str, args: Value) -> ToolResult;
    /// Tear down any owned process/connection. Idempotent.
    async fn close(&self);

    /// Force-discard cached credentials and reconnect. Only the remote
    /// backend supports this; other implementations report it unsupported.
    async fn reauth(&self) -> ToolResult {
        ToolResult::error("this backend does not support reauth")
    }
}

/// Adapts [`LocalBackend`] to the router's [`Backend`] contract. Auth
/// material is fixed at construction — the local backend forwards the
/// same credentials for every call, since MCP tool calls carry no HTTP
/// headers of their own (spec.md §4.4's `CallContext` is per-router, not
/// per-request, in this deployment shape).
pub struct LocalAdapter<H: HttpClient> {
    inner: LocalBackend<H>,
    ctx: CallContext,
}

impl<H: HttpClient> LocalAdapter<H> {
    /// Wrap `inner`, forwarding `ctx` on every call.
    #[must_use]
    pub fn new(inner: LocalBackend<H>, ctx: CallContext) -> Self {
        Self { inner, ctx }
    }
}

#[async_trait]
impl<H: HttpClient> Backend for LocalAdapter<H> {
    async fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.inner.list_tools()
    }

    async fn call_tool(&self, name: &str, args: Value) -> ToolResult {
        self.inner.call_tool(name, args, &self.ctx).await
    }

    async fn close(&self) {
        // No owned process or connection to tear down.
    }
}

/// Adapts [`RemoteBackend`] to the router's [`Backend`] contract, folding
/// transport errors into error [`ToolResult`]s — the router never sees a
/// [`mcp_remote::RemoteError`] directly.
pub struct RemoteAdapter {
    inner: RemoteBackend,
}

impl RemoteAdapter {
    /// Wrap an already-connected (or not) [`RemoteBackend`].
    #[must_use]
    pub fn new(inner: RemoteBackend) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Backend for RemoteAdapter {
    async fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.inner.tools().await
    }

    async fn call_tool(&self, name: &str, args: Value) -> ToolResult {
        match self.inner.call_tool(name, args).await {
            Ok(result) => result,
            Err(err) => {
                let classified = mcp_error::McpError::from(&err);
                tracing::warn!(code = %classified.code, category = %classified.category(), "{}", classified.message);
                ToolResult::error(classified.message)
            }
        }
    }

    async fn close(&self) {
        self.inner.disconnect().await;
    }

    async fn reauth(&self) -> ToolResult {
        let summary = self.inner.reauth().await;
        match serde_json::to_value(&summary) {
            Ok(value) => {
                let mut result = ToolResult::ok_json(&value);
                result.is_error = summary.status == "reauth_failed";
                result
            }
            Err(err) => ToolResult::error(format!("failed to serialize reauth summary: {err}")),
        }
    }
}
