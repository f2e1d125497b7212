//! C6: the router — state machine, route table build, and per-mode
//! dispatch (spec.md §4.6).
#![deny(unsafe_code)]

mod backend;
mod boost;
mod route_table;

pub use backend::{Backend, LocalAdapter, RemoteAdapter};
pub use boost::extract_uuid;
pub use route_table::{build_route_table, reads, writes};

use mcp_core::{RouteEntry, RouteMode, ToolContent, ToolDescriptor, ToolResult};
use mcp_error::{ErrorCode, McpError};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Name of the always-present meta tool that triggers remote reauth
/// (spec.md §4.6 "meta tools").
pub const REAUTH_TOOL_NAME: &str = "mcp-router-reauth";

/// Name of the reserved, currently inert operational-tools placeholder
/// (spec.md §4.6 "future operational tools").
pub const OPERATIONAL_TOOL_NAME: &str = "mcp-router-status";

/// Substrings in an error message that warrant the auth-hint append
/// (spec.md §4.6 "auth hint").
const AUTH_HINT_MARKERS: &[&str] = &[
    "401",
    "unauthorized",
    "token expired",
    "token invalid",
    "authentication",
];

const AUTH_HINT_SUFFIX: &str = "hint: call mcp-router-reauth to refresh stored credentials.";

/// Router lifecycle state (spec.md §4.6 "Init → Connecting →
/// (Ready | DegradedReadOnly | Dead)").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterState {
    /// Constructed but not yet started.
    Init,
    /// `start()` is attempting to connect both backends.
    Connecting,
    /// Both backends connected.
    Ready,
    /// Only the local (fast) backend connected; remote calls fail fast.
    DegradedReadOnly,
    /// Neither backend connected; `start()` returns an error.
    Dead,
}

/// `start()` failed because neither backend connected.
#[derive(Debug, thiserror::Error)]
#[error("router start failed: neither backend connected")]
pub struct RouterDeadError;

/// The router (C6): owns both backends, the route table, and dispatch.
pub struct Router {
    official: Option<Box<dyn Backend>>,
    local: Option<Box<dyn Backend>>,
    state: RwLock<RouterState>,
    routes: RwLock<HashMap<String, RouteEntry>>,
    descriptors: RwLock<HashMap<String, ToolDescriptor>>,
}

impl Router {
    /// Construct a router in [`RouterState::Init`] with no backends attached.
    #[must_use]
    pub fn new() -> Self {
        Self {
            official: None,
            local: None,
            state: RwLock::new(RouterState::Init),
            routes: RwLock::new(HashMap::new()),
            descriptors: RwLock::new(HashMap::new()),
        }
    }

    /// Attach (already-attempted-to-connect) backends, build the route
    /// table, and settle the state machine.
    ///
    /// Backends are expected to have already run their own connect
    /// attempts concurrently (spec.md §5 "all_settled semantics") —
    /// `None` here means that attempt failed or was never made.
    ///
    /// # Errors
    ///
    /// Returns [`RouterDeadError`] if neither backend is present.
    pub async fn start(
        &mut self,
        official: Option<Box<dyn Backend>>,
        local: Option<Box<dyn Backend>>,
    ) -> Result<(), RouterDeadError> {
        *self.state.write().await = RouterState::Connecting;

        let (routes, descriptors) = Self::fetch_routes(official.as_deref(), local.as_deref()).await;

        let state = match (official.is_some(), local.is_some()) {
            (true, true) => RouterState::Ready,
            (false, true) => RouterState::DegradedReadOnly,
            (true, false) => RouterState::Ready,
            (false, false) => RouterState::Dead,
        };
        if state == RouterState::DegradedReadOnly {
            tracing::warn!("remote backend unavailable at startup; serving fast-backend reads only");
        }

        self.official = official;
        self.local = local;
        *self.routes.write().await = routes;
        *self.descriptors.write().await = descriptors;
        *self.state.write().await = state;

        if state == RouterState::Dead {
            return Err(RouterDeadError);
        }
        Ok(())
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> RouterState {
        *self.state.read().await
    }

    /// Fetch both backends' tool lists and derive the route table plus the
    /// name-to-descriptor map from them (official's descriptor wins on a
    /// name collision).
    async fn fetch_routes(
        official: Option<&dyn Backend>,
        local: Option<&dyn Backend>,
    ) -> (HashMap<String, RouteEntry>, HashMap<String, ToolDescriptor>) {
        let official_tools = match official {
            Some(backend) => Some(backend.list_tools().await),
            None => None,
        };
        let fast_tools = match local {
            Some(backend) => Some(backend.list_tools().await),
            None => None,
        };

        let mut descriptors = HashMap::new();
        for tool in official_tools.iter().flatten().chain(fast_tools.iter().flatten()) {
            descriptors.entry(tool.name.clone()).or_insert_with(|| tool.clone());
        }

        let routes = route_table::build_route_table(official_tools, fast_tools);
        (routes, descriptors)
    }

    /// Tear down both backends (spec.md §5 "on SIGINT/SIGTERM the router
    /// tears down both backends before exit"). Idempotent.
    pub async fn shutdown(&self) {
        if let Some(backend) = &self.official {
            backend.close().await;
        }
        if let Some(backend) = &self.local {
            backend.close().await;
        }
    }

    /// List the route table's tools plus the two always-present meta tools.
    pub async fn list_tools(&self) -> Vec<ToolDescriptor> {
        let routes = self.routes.read().await;
        let descriptors = self.descriptors.read().await;
        let mut tools: Vec<ToolDescriptor> = routes
            .keys()
            .filter_map(|name| descriptors.get(name).cloned())
            .collect();
        tools.push(ToolDescriptor {
            name: REAUTH_TOOL_NAME.to_string(),
            description: "Force the remote backend to discard cached OAuth tokens and reconnect.".to_string(),
            input_schema: serde_json::json!({"type": "object", "properties": {}}),
            read_only_hint: false,
        });
        tools.push(ToolDescriptor {
            name: OPERATIONAL_TOOL_NAME.to_string(),
            description: "Reserved for future operational tooling; currently a no-op.".to_string(),
            input_schema: serde_json::json!({"type": "object", "properties": {}}),
            read_only_hint: true,
        });
        tools
    }

    /// Dispatch a single `call_tool(name, args)`.
    ///
    /// Samples the route table once at entry and dispatches against that
    /// snapshot for the duration of the call (spec.md §4.6 "A tool call
    /// samples the current route table once at entry").
    pub async fn call_tool(&self, name: &str, args: Value) -> ToolResult {
        if name == REAUTH_TOOL_NAME {
            return self.dispatch_reauth().await;
        }
        if name == OPERATIONAL_TOOL_NAME {
            return ToolResult::ok_json(&serde_json::json!({"status": "not_implemented"}));
        }

        let entry = self.routes.read().await.get(name).cloned();
        let Some(entry) = entry else {
            return dispatch_error(ErrorCode::UnknownTool, format!("unknown tool: {name}"));
        };

        match entry.mode {
            RouteMode::Official => self.dispatch_official(&entry.tool_name, args).await,
            RouteMode::FastOnly => self.dispatch_fast_only(&entry.tool_name, args).await,
            RouteMode::OfficialWithFastBoost => self.dispatch_boost(&entry.tool_name, args).await,
            RouteMode::FastThenOfficialSameName => {
                self.dispatch_fast_then_official(&entry.tool_name, args).await
            }
        }
    }

    async fn dispatch_official(&self, name: &str, args: Value) -> ToolResult {
        let Some(official) = &self.official else {
            return dispatch_error(ErrorCode::BackendUnavailable, "remote backend is unavailable");
        };
        let mut result = official.call_tool(name, args).await;
        if result.is_error {
            apply_auth_hint(&mut result);
        }
        result
    }

    async fn dispatch_fast_only(&self, name: &str, args: Value) -> ToolResult {
        let Some(local) = &self.local else {
            return dispatch_error(ErrorCode::BackendUnavailable, "fast backend is unavailable");
        };
        local.call_tool(name, args).await
    }

    async fn dispatch_boost(&self, name: &str, args: Value) -> ToolResult {
        if let Some(local) = &self.local {
            let normalized = ToolDescriptor::normalize_name(name);
            if let Some(result) = boost::try_boost(local.as_ref(), &normalized, &args).await {
                return result;
            }
        }
        self.dispatch_official(name, args).await
    }

    async fn dispatch_fast_then_official(&self, name: &str, args: Value) -> ToolResult {
        let Some(local) = &self.local else {
            return self.dispatch_official(name, args).await;
        };
        let result = local.call_tool(name, args.clone()).await;
        if result.is_error || result.is_empty_read() {
            return self.dispatch_official(name, args).await;
        }
        result
    }

    /// Reauth always rebuilds the route table unconditionally on success
    /// (spec.md §3 "Route table ... rebuilt after a successful reauth") —
    /// tool-name stability across reconnects is assumed, but not relied on.
    async fn dispatch_reauth(&self) -> ToolResult {
        let Some(official) = self.official.as_ref() else {
            return dispatch_error(ErrorCode::BackendUnavailable, "remote backend is unavailable");
        };
        let result = official.reauth().await;
        if !result.is_error {
            let (routes, descriptors) =
                Self::fetch_routes(Some(official.as_ref()), self.local.as_deref()).await;
            *self.routes.write().await = routes;
            *self.descriptors.write().await = descriptors;
            tracing::info!("route table rebuilt after reauth");
        }
        result
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify a dispatch failure by [`ErrorCode`] (spec.md §7), log it at its
/// category's severity, and turn it into the [`ToolResult`] the client sees.
fn dispatch_error(code: ErrorCode, message: impl Into<String>) -> ToolResult {
    let err = McpError::new(code, message);
    tracing::warn!(code = %err.code, category = %err.category(), "{}", err.message);
    ToolResult::error(err.message)
}

fn apply_auth_hint(result: &mut ToolResult) {
    let Some(ToolContent::Text { text }) = result.content.first() else {
        return;
    };
    let lower = text.to_ascii_lowercase();
    if AUTH_HINT_MARKERS.iter().any(|marker| lower.contains(marker)) {
        result.append_error_hint(AUTH_HINT_SUFFIX);
    }
}
