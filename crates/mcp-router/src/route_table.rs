//! Route table build (spec.md §4.6 "Route table build").

use mcp_core::{RouteEntry, RouteMode, ToolDescriptor};
use std::collections::{HashMap, HashSet};

/// First-token verbs that classify a tool name as a read (spec.md §4.6
/// "name class", Glossary "reads/writes").
const READ_VERBS: &[&str] = &["get", "list", "retrieve", "search", "query", "fetch"];

/// First-token verbs that classify a tool name as a write.
const WRITE_VERBS: &[&str] = &[
    "create", "update", "delete", "append", "remove", "archive", "move", "duplicate", "add",
    "set", "patch",
];

/// Tool names (normalized) the fast-boost table routes through
/// `OFFICIAL_WITH_FAST_BOOST` rather than plain `OFFICIAL`.
const BOOST_NAMES: &[&str] = &["fetch", "search", "get-users"];

fn first_token(normalized: &str) -> &str {
    normalized.split(['-', '_']).next().unwrap_or(normalized)
}

/// `true` iff `name`'s first token is a read verb.
#[must_use]
pub fn reads(name: &str) -> bool {
    READ_VERBS.contains(&first_token(&ToolDescriptor::normalize_name(name)))
}

/// `true` iff `name`'s first token is a write verb.
#[must_use]
pub fn writes(name: &str) -> bool {
    WRITE_VERBS.contains(&first_token(&ToolDescriptor::normalize_name(name)))
}

/// Build the route table from each backend's currently-listed tools.
///
/// `official_tools`/`fast_tools` are `None` when that backend never
/// connected. The table is keyed by tool name as exposed to the client,
/// never by the normalized form (spec.md §4.6 "exposed name").
#[must_use]
pub fn build_route_table(
    official_tools: Option<Vec<ToolDescriptor>>,
    fast_tools: Option<Vec<ToolDescriptor>>,
) -> HashMap<String, RouteEntry> {
    let fast_names: HashSet<String> = fast_tools
        .iter()
        .flatten()
        .map(|t| t.name.clone())
        .collect();
    let official_names: HashSet<String> = official_tools
        .iter()
        .flatten()
        .map(|t| t.name.clone())
        .collect();

    // exposed = O.tools if O present, else read-only-filtered F.tools
    // (spec.md §4.6 "Exposed tool set").
    let exposed: Vec<ToolDescriptor> = match official_tools {
        Some(tools) => tools,
        None => fast_tools
            .unwrap_or_default()
            .into_iter()
            .filter(|t| reads(&t.name) && !writes(&t.name))
            .collect(),
    };

    let mut table = HashMap::with_capacity(exposed.len());
    for tool in exposed {
        let has_official = official_names.contains(&tool.name);
        let has_fast = fast_names.contains(&tool.name);
        let mode = match (has_official, has_fast) {
            (true, false) => {
                let normalized = ToolDescriptor::normalize_name(&tool.name);
                if BOOST_NAMES.contains(&normalized.as_str()) {
                    RouteMode::OfficialWithFastBoost
                } else {
                    RouteMode::Official
                }
            }
            (false, true) => RouteMode::FastOnly,
            (true, true) => {
                if reads(&tool.name) && !writes(&tool.name) {
                    RouteMode::FastThenOfficialSameName
                } else {
                    RouteMode::Official
                }
            }
            (false, false) => continue,
        };
        table.insert(tool.name.clone(), RouteEntry::new(tool.name, mode));
    }
    table
}
