//! `OFFICIAL_WITH_FAST_BOOST` dispatch (spec.md §4.6 "Boost sequence"):
//! `fetch`, `search`, and `get-users` each have a local-backend equivalent
//! worth trying before paying for a remote round-trip.

use crate::backend::Backend;
use mcp_core::ToolResult;
use serde_json::{json, Value};

/// `fetch`'s ordered chain of local-backend retrieve operations, tried in
/// turn until one returns a non-empty success.
const FETCH_CHAIN: &[(&str, &str)] = &[
    ("retrieve-a-page", "page_id"),
    ("retrieve-a-database", "database_id"),
    ("retrieve-a-data-source", "data_source_id"),
    ("retrieve-a-block", "block_id"),
    ("retrieve-a-comment", "comment_id"),
];

/// Extract the first 32-hex or 8-4-4-4-12 UUID substring of `input`;
/// otherwise return `input` unchanged (spec.md §4.6 "UUID extraction").
#[must_use]
pub fn extract_uuid(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let is_hex = |c: &char| c.is_ascii_hexdigit();

    for start in 0..chars.len() {
        if let Some(candidate) = try_dashed_uuid(&chars, start, is_hex) {
            return candidate;
        }
        if let Some(candidate) = try_bare_uuid(&chars, start, is_hex) {
            return candidate;
        }
    }
    input.to_string()
}

fn try_dashed_uuid(chars: &[char], start: usize, is_hex: impl Fn(&char) -> bool) -> Option<String> {
    const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];
    let mut pos = start;
    for (i, &len) in GROUPS.iter().enumerate() {
        if pos + len > chars.len() || !chars[pos..pos + len].iter().all(&is_hex) {
            return None;
        }
        pos += len;
        if i + 1 < GROUPS.len() {
            if pos >= chars.len() || chars[pos] != '-' {
                return None;
            }
            pos += 1;
        }
    }
    Some(chars[start..pos].iter().collect())
}

fn try_bare_uuid(chars: &[char], start: usize, is_hex: impl Fn(&char) -> bool) -> Option<String> {
    if start + 32 > chars.len() || !chars[start..start + 32].iter().all(&is_hex) {
        return None;
    }
    // Don't match inside a longer run of hex digits (keep it exactly 32).
    if start + 32 < chars.len() && is_hex(&chars[start + 32]) {
        return None;
    }
    Some(chars[start..start + 32].iter().collect())
}

/// Strip a `collection://` prefix before UUID extraction (spec.md §4.6
/// "collection:// prefix").
fn resolve_id(raw: &str) -> String {
    let unwrapped = raw.strip_prefix("collection://").unwrap_or(raw);
    extract_uuid(unwrapped)
}

/// Try the local-backend equivalent of `normalized_name`. Returns `None`
/// when the boost's preconditions aren't met or every candidate failed —
/// callers fall through to the official backend either way.
pub async fn try_boost(fast: &dyn Backend, normalized_name: &str, args: &Value) -> Option<ToolResult> {
    match normalized_name {
        "search" => {
            let result = fast.call_tool("post-search", args.clone()).await;
            accept(result)
        }
        "get-users" => {
            let user_id = args.get("user_id").and_then(Value::as_str).filter(|s| !s.is_empty());
            let result = match user_id {
                Some(id) => fast.call_tool("get-user", json!({ "user_id": id })).await,
                None => fast.call_tool("get-users", json!({})).await,
            };
            accept(result)
        }
        "fetch" => {
            let obj = args.as_object()?;
            if obj.len() != 1 {
                return None;
            }
            let id = resolve_id(obj.get("id")?.as_str()?);
            for (tool_name, arg_key) in FETCH_CHAIN {
                let result = fast.call_tool(tool_name, json!({ *arg_key: id })).await;
                if let Some(result) = accept(result) {
                    return Some(result);
                }
            }
            None
        }
        _ => None,
    }
}

fn accept(result: ToolResult) -> Option<ToolResult> {
    if result.is_error || result.is_empty_read() {
        None
    } else {
        Some(result)
    }
}
