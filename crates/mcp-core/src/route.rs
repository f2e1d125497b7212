use serde::{Deserialize, Serialize};

/// How a tool call is dispatched (§3 "Route entry", §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteMode {
    /// Forward to the remote backend only.
    Official,
    /// Forward to the local backend only.
    FastOnly,
    /// Try a fast equivalent first; fall back to remote on failure/empty.
    OfficialWithFastBoost,
    /// Call local; on error or empty read, call remote with the same name.
    FastThenOfficialSameName,
}

/// A single entry in the router's route table, built once both backends
/// have finished connecting (§3 "Route entry", §4.6 "Route table build").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteEntry {
    /// Dispatch mode for this tool.
    pub mode: RouteMode,
    /// Name forwarded to the backend(s).
    pub tool_name: String,
}

impl RouteEntry {
    /// Construct a route entry for `tool_name` in `mode`.
    #[must_use]
    pub fn new(tool_name: impl Into<String>, mode: RouteMode) -> Self {
        Self {
            mode,
            tool_name: tool_name.into(),
        }
    }
}
