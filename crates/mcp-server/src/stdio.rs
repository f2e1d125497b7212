//! C7: the stdio JSON-RPC adapter. Reads [`Envelope::Request`]s from
//! stdin, dispatches `tools/list`/`tools/call` to the [`Router`], and
//! writes [`Envelope::Response`]s to stdout (spec.md §6 "Transport to
//! client").

use mcp_protocol::{Envelope, JsonlCodec, ProtocolError};
use mcp_router::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{self, AsyncWriteExt, BufReader};

const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

/// Serve `tools/list`/`tools/call` over stdio until the client closes
/// stdin or a read error occurs.
pub async fn serve(router: Arc<Router>) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut reader = BufReader::new(stdin);

    loop {
        let envelope = match JsonlCodec::read_envelope(&mut reader).await {
            Ok(envelope) => envelope,
            Err(ProtocolError::Closed) => return Ok(()),
            Err(err) => {
                tracing::warn!(error = %err, "malformed line on stdin, skipping");
                continue;
            }
        };

        let Envelope::Request { id, method, params, .. } = envelope else {
            continue;
        };

        let response = match method.as_str() {
            "tools/list" => {
                let tools = router.list_tools().await;
                Envelope::response_ok(id, json!({ "tools": tools }))
            }
            "tools/call" => match dispatch_call(&router, params).await {
                Ok(value) => Envelope::response_ok(id, value),
                Err(message) => Envelope::response_err(id, INVALID_PARAMS, message),
            },
            other => Envelope::response_err(id, METHOD_NOT_FOUND, format!("unknown method: {other}")),
        };

        let line = JsonlCodec::encode(&response)?;
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await?;
    }
}

async fn dispatch_call(router: &Router, params: Option<Value>) -> Result<Value, String> {
    let params = params.ok_or_else(|| "tools/call requires params".to_string())?;
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| "tools/call params.name must be a string".to_string())?;
    let args = params.get("arguments").cloned().unwrap_or(json!({}));
    let result = router.call_tool(name, args).await;
    serde_json::to_value(&result).map_err(|e| e.to_string())
}
