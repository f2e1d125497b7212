use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One content item of a tool result (§6 "Transport to client").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContent {
    /// A JSON text payload, opaque to the router.
    Text {
        /// The text payload, usually a JSON-encoded string.
        text: String,
    },
}

/// The result of a `call_tool` invocation, as returned to the MCP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// One or more content items.
    pub content: Vec<ToolContent>,
    /// Set on error results; absent (serialized as `false`) otherwise.
    #[serde(default, rename = "is_error")]
    pub is_error: bool,
}

impl ToolResult {
    /// Build a successful single-text result from a JSON value.
    #[must_use]
    pub fn ok_json(value: &Value) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: value.to_string(),
            }],
            is_error: false,
        }
    }

    /// Build a successful single-text result from an already-serialized string.
    #[must_use]
    pub fn ok_text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Build an error result carrying a human-readable message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }

    /// Append `suffix` to the text of an error result's first content item.
    ///
    /// No-op on success results; used for the auth-hint append in §4.6.
    pub fn append_error_hint(&mut self, suffix: &str) {
        if !self.is_error {
            return;
        }
        if let Some(ToolContent::Text { text }) = self.content.first_mut() {
            text.push(' ');
            text.push_str(suffix);
        }
    }

    /// §4.6 "Empty-read detection": single text item, success, parses as
    /// JSON, and one of `results`/`users`/`items` is a zero-length array.
    #[must_use]
    pub fn is_empty_read(&self) -> bool {
        const ARRAY_KEYS: [&str; 3] = ["results", "users", "items"];

        if self.is_error || self.content.len() != 1 {
            return false;
        }
        let ToolContent::Text { text } = &self.content[0];
        let Ok(parsed) = serde_json::from_str::<Value>(text) else {
            return false;
        };
        let Some(obj) = parsed.as_object() else {
            return false;
        };
        ARRAY_KEYS
            .iter()
            .any(|k| obj.get(*k).and_then(Value::as_array).is_some_and(Vec::is_empty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_read_detects_empty_results_array() {
        let r = ToolResult::ok_text(json!({"results": []}).to_string());
        assert!(r.is_empty_read());
    }

    #[test]
    fn empty_read_false_on_nonempty_array() {
        let r = ToolResult::ok_text(json!({"results": [1]}).to_string());
        assert!(!r.is_empty_read());
    }

    #[test]
    fn empty_read_false_on_error_result() {
        let r = ToolResult::error("boom");
        assert!(!r.is_empty_read());
    }

    #[test]
    fn empty_read_false_on_non_json_text() {
        let r = ToolResult::ok_text("not json");
        assert!(!r.is_empty_read());
    }

    #[test]
    fn append_error_hint_only_affects_errors() {
        let mut ok = ToolResult::ok_text("{}");
        ok.append_error_hint("hint");
        let ToolContent::Text { text } = &ok.content[0];
        assert_eq!(text, "{}");

        let mut err = ToolResult::error("401 unauthorized");
        err.append_error_hint("try login");
        let ToolContent::Text { text } = &err.content[0];
        assert!(text.ends_with("try login"));
    }
}
