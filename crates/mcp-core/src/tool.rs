use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool as advertised by either backend (§3 "Tool descriptor").
///
/// `name` is immutable for the lifetime of a backend connection; two tools
/// are "same-name" iff their names are byte-equal.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ToolDescriptor {
    /// Tool name as exposed to the MCP client.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's input, opaque to the router.
    pub input_schema: Value,
    /// Whether the backend declares this tool read-only.
    pub read_only_hint: bool,
}

impl ToolDescriptor {
    /// Normalize a tool name the way §4.6's name-class matching does:
    /// lower-case, with a leading `notion[-_:]` prefix stripped.
    #[must_use]
    pub fn normalize_name(name: &str) -> String {
        let lower = name.to_ascii_lowercase();
        for sep in ['-', '_', ':'] {
            let prefix = format!("notion{sep}");
            if let Some(stripped) = lower.strip_prefix(&prefix) {
                return stripped.to_string();
            }
        }
        lower
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_notion_prefix_variants() {
        assert_eq!(ToolDescriptor::normalize_name("notion-search"), "search");
        assert_eq!(ToolDescriptor::normalize_name("notion_search"), "search");
        assert_eq!(ToolDescriptor::normalize_name("notion:search"), "search");
        assert_eq!(ToolDescriptor::normalize_name("NOTION-Search"), "search");
    }

    #[test]
    fn normalize_is_identity_without_prefix() {
        assert_eq!(ToolDescriptor::normalize_name("fetch"), "fetch");
    }
}
