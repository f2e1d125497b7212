//! The local (fast) backend (spec.md §4.4): tool discovery over a
//! pre-parsed OpenAPI operation table, read-only allowlist enforcement,
//! and the cache → fast-path → HTTP read path.
#![deny(unsafe_code)]

mod alias;
mod http;
mod rehydrate;

pub use alias::{build_alias_table, truncate_64, AliasTarget};
pub use http::{HttpClient, HttpClientError, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use rehydrate::rehydrate;

use mcp_cache::{auth_fingerprint, cache_key, split_control_fields, Operation, ResponseCache};
use mcp_core::{ToolDescriptor, ToolResult};
use mcp_fastpath::FastPath;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};

/// A single OpenAPI-derived operation, as handed to this crate by the
/// (out-of-scope) OpenAPI→tool-descriptor converter.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationSpec {
    pub tool_name: String,
    pub description: String,
    pub input_schema: Value,
    pub method: String,
    pub path: String,
    pub operation_id: Option<String>,
}

/// Per-call auth material forwarded verbatim from the client
/// (spec.md §4.4 step 4 "auth_fingerprint").
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    pub authorization: Option<String>,
    pub api_version: Option<String>,
}

enum Resolved<'a> {
    Allowed(&'a OperationSpec),
    Blocked,
    Unknown,
}

/// Fast-path operations the SQLite reader can satisfy (spec.md §4.3
/// "Supported operations").
enum FastPathOp {
    RetrieveAPage,
    RetrieveABlock,
    GetBlockChildren,
}

fn fastpath_op(tool_name: &str) -> Option<FastPathOp> {
    match ToolDescriptor::normalize_name(tool_name).as_str() {
        "retrieve-a-page" => Some(FastPathOp::RetrieveAPage),
        "retrieve-a-block" => Some(FastPathOp::RetrieveABlock),
        "get-block-children" => Some(FastPathOp::GetBlockChildren),
        _ => None,
    }
}

/// The local (fast) backend (C4).
pub struct LocalBackend<H: HttpClient> {
    operations: HashMap<String, OperationSpec>,
    blocked: HashSet<String>,
    aliases: HashMap<String, AliasTarget>,
    cache: ResponseCache<Value>,
    fastpath: Option<FastPath>,
    http: H,
    base_url: String,
}

impl<H: HttpClient> LocalBackend<H> {
    /// Filter `all_operations` by `allowlist` (operation-id → permitted
    /// HTTP method, case-insensitive), keeping only matching entries
    /// listable/callable; everything else is tracked as "blocked" so
    /// calling it yields `READ_ONLY_OPERATION_BLOCKED` rather than
    /// "unknown tool".
    #[must_use]
    pub fn new(
        all_operations: Vec<OperationSpec>,
        allowlist: BTreeMap<String, String>,
        base_url: impl Into<String>,
        http: H,
        cache: ResponseCache<Value>,
        fastpath: Option<FastPath>,
    ) -> Self {
        let mut operations = HashMap::new();
        let mut blocked = HashSet::new();

        for op in all_operations {
            let allowed = op
                .operation_id
                .as_deref()
                .and_then(|id| allowlist.get(id))
                .is_some_and(|method| method.eq_ignore_ascii_case(&op.method));
            if allowed {
                operations.insert(op.tool_name.clone(), op);
            } else {
                blocked.insert(op.tool_name);
            }
        }

        let aliases = build_alias_table(operations.keys().map(String::as_str));

        Self {
            operations,
            blocked,
            aliases,
            cache,
            fastpath,
            http,
            base_url: base_url.into(),
        }
    }

    /// List the allowlisted, discoverable tools.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.operations
            .values()
            .map(|op| ToolDescriptor {
                name: op.tool_name.clone(),
                description: op.description.clone(),
                input_schema: op.input_schema.clone(),
                read_only_hint: true,
            })
            .collect()
    }

    fn resolve(&self, name: &str) -> Resolved<'_> {
        if let Some(op) = self.operations.get(name) {
            return Resolved::Allowed(op);
        }
        if self.blocked.contains(name) {
            return Resolved::Blocked;
        }
        match self.aliases.get(name) {
            Some(AliasTarget::Canonical(canonical)) => {
                if let Some(op) = self.operations.get(canonical) {
                    Resolved::Allowed(op)
                } else if self.blocked.contains(canonical) {
                    Resolved::Blocked
                } else {
                    Resolved::Unknown
                }
            }
            Some(AliasTarget::Ambiguous) | None => Resolved::Unknown,
        }
    }

    /// Dispatch a `call_tool(name, args)` through the 7-step read path
    /// (spec.md §4.4 "Call dispatch").
    pub async fn call_tool(&self, name: &str, args: Value, ctx: &CallContext) -> ToolResult {
        let op = match self.resolve(name) {
            Resolved::Allowed(op) => op,
            Resolved::Blocked => {
                return ToolResult::error(format!("READ_ONLY_OPERATION_BLOCKED: {name}"));
            }
            Resolved::Unknown => return ToolResult::error(format!("unknown tool: {name}")),
        };

        let rehydrated = rehydrate(args);
        let (force_refresh, sanitized) = split_control_fields(rehydrated);

        let operation = Operation::new(op.method.clone(), op.path.clone(), op.operation_id.clone());
        let fingerprint = auth_fingerprint(
            ctx.authorization.as_deref().unwrap_or(""),
            ctx.api_version.as_deref().unwrap_or(""),
        );
        let params = json!({
            "args": sanitized,
            "context": { "auth_fingerprint": fingerprint, "base_url": self.base_url },
        });
        let key = match cache_key(&operation, &params) {
            Ok(key) => key,
            Err(err) => return ToolResult::error(format!("failed to build cache key: {err}")),
        };

        if !force_refresh {
            if let Some(cached) = self.cache.get(&key) {
                return ToolResult::ok_json(&cached);
            }
        }

        if !force_refresh {
            if let (Some(fp_op), Some(fastpath)) = (fastpath_op(&op.tool_name), &self.fastpath) {
                match try_fastpath(fastpath, &fp_op, &sanitized) {
                    Some(value) => {
                        self.cache.set(key, value.clone());
                        return ToolResult::ok_json(&value);
                    }
                    None => {
                        tracing::debug!(tool = name, "fastpath miss, falling through to HTTP");
                    }
                }
            }
        }

        let request = HttpRequest {
            method: op.method.clone(),
            path: op.path.clone(),
            operation_id: op.operation_id.clone(),
            params: sanitized,
            authorization: ctx.authorization.clone(),
            api_version: ctx.api_version.clone(),
        };

        match self.http.call(request).await {
            Ok(response) => {
                self.cache.set(key, response.data.clone());
                ToolResult::ok_json(&response.data)
            }
            Err(err) => {
                let payload = json!({
                    "status": "error",
                    "message": err.message,
                    "data": err.data,
                });
                let mut result = ToolResult::ok_json(&payload);
                result.is_error = true;
                result
            }
        }
    }
}

fn try_fastpath(fastpath: &FastPath, op: &FastPathOp, args: &Value) -> Option<Value> {
    match op {
        FastPathOp::RetrieveAPage => {
            let page_id = args.get("page_id")?.as_str()?;
            fastpath.retrieve_a_page(page_id)
        }
        FastPathOp::RetrieveABlock => {
            let block_id = args.get("block_id")?.as_str()?;
            fastpath.retrieve_a_block(block_id)
        }
        FastPathOp::GetBlockChildren => {
            let block_id = args.get("block_id")?.as_str()?;
            let page_size = args.get("page_size").and_then(Value::as_u64).map(|v| v as u32);
            let start_cursor = args.get("start_cursor").and_then(Value::as_str);
            fastpath.get_block_children(block_id, page_size, start_cursor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct StubHttpClient {
        response: Mutex<Option<Result<HttpResponse, HttpClientError>>>,
        calls: Mutex<usize>,
    }

    impl StubHttpClient {
        fn ok(data: Value) -> Self {
            Self {
                response: Mutex::new(Some(Ok(HttpResponse {
                    data,
                    status: 200,
                    headers: BTreeMap::new(),
                }))),
                calls: Mutex::new(0),
            }
        }

        fn err(message: &str) -> Self {
            Self {
                response: Mutex::new(Some(Err(HttpClientError {
                    message: message.to_string(),
                    status: Some(404),
                    data: Some(json!({"code": "not_found"})),
                    headers: BTreeMap::new(),
                }))),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl HttpClient for StubHttpClient {
        async fn call(&self, _request: HttpRequest) -> Result<HttpResponse, HttpClientError> {
            *self.calls.lock().unwrap() += 1;
            self.response.lock().unwrap().take().expect("called twice")
        }
    }

    fn op(tool_name: &str, operation_id: &str) -> OperationSpec {
        OperationSpec {
            tool_name: tool_name.to_string(),
            description: "test op".into(),
            input_schema: json!({"type": "object"}),
            method: "GET".into(),
            path: format!("/x/{tool_name}"),
            operation_id: Some(operation_id.to_string()),
        }
    }

    fn allowlist(ids: &[&str]) -> BTreeMap<String, String> {
        ids.iter().map(|id| (id.to_string(), "GET".to_string())).collect()
    }

    fn backend(ops: Vec<OperationSpec>, allowed_ids: &[&str], http: StubHttpClient) -> LocalBackend<StubHttpClient> {
        LocalBackend::new(
            ops,
            allowlist(allowed_ids),
            "https://api.example.com",
            http,
            ResponseCache::new(30_000, 10, None),
            None,
        )
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let backend = backend(vec![], &[], StubHttpClient::ok(json!({})));
        let result = backend.call_tool("nope", json!({}), &CallContext::default()).await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn blocked_operation_is_read_only_blocked() {
        let backend = backend(vec![op("delete-page", "delete-page")], &[], StubHttpClient::ok(json!({})));
        let result = backend
            .call_tool("delete-page", json!({}), &CallContext::default())
            .await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn successful_call_is_cached() {
        let http = StubHttpClient::ok(json!({"id": "abc"}));
        let backend = backend(vec![op("retrieve-a-page", "retrieve-a-page")], &["retrieve-a-page"], http);

        let first = backend
            .call_tool("retrieve-a-page", json!({"page_id": "abc"}), &CallContext::default())
            .await;
        assert!(!first.is_error);

        // Second call with identical args hits the cache, not the stubbed
        // HTTP client (which only yields one response and would panic on
        // a second call).
        let second = backend
            .call_tool("retrieve-a-page", json!({"page_id": "abc"}), &CallContext::default())
            .await;
        assert!(!second.is_error);
    }

    #[tokio::test]
    async fn http_error_is_not_cached() {
        let http = StubHttpClient::err("not found");
        let backend = backend(vec![op("retrieve-a-page", "retrieve-a-page")], &["retrieve-a-page"], http);
        let result = backend
            .call_tool("retrieve-a-page", json!({"page_id": "missing"}), &CallContext::default())
            .await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn force_refresh_bypasses_cache_without_forwarding_control_field() {
        let backend = backend(
            vec![op("retrieve-a-page", "retrieve-a-page")],
            &["retrieve-a-page"],
            StubHttpClient::ok(json!({"id": "abc"})),
        );
        let args = json!({"page_id": "abc", "__mcpFastForceRefresh": true});
        let result = backend.call_tool("retrieve-a-page", args, &CallContext::default()).await;
        assert!(!result.is_error);
    }
}
