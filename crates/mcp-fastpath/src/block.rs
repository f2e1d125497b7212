use crate::richtext::{flatten_text, richtext};
use crate::row::Row;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

fn iso(millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(millis).map(|dt| dt.to_rfc3339())
}

/// Map a local block type to the external API's block type
/// (spec.md §4.3 "Block projection" fixed table). Unmapped types pass
/// through unchanged (`*→identity`).
#[must_use]
pub fn map_block_type(local_type: &str) -> String {
    match local_type {
        "text" => "paragraph",
        "header" => "heading_1",
        "sub_header" => "heading_2",
        "sub_sub_header" => "heading_3",
        "bulleted_list" => "bulleted_list_item",
        "numbered_list" => "numbered_list_item",
        "page" => "child_page",
        other => other,
    }
    .to_string()
}

const RICH_TEXT_TYPES: [&str; 6] = [
    "paragraph",
    "heading_1",
    "heading_2",
    "heading_3",
    "bulleted_list_item",
    "numbered_list_item",
];

/// Project a row into the external API's block shape
/// (spec.md §4.3 "Block projection"). Returns `None` on any validation
/// failure.
#[must_use]
pub fn project_block(row: &Row) -> Option<Value> {
    if row.r#type.is_empty() {
        return None;
    }
    let properties_raw = row.properties.as_deref()?;
    let properties: Value = serde_json::from_str(properties_raw).ok()?;
    if !properties.is_object() {
        return None;
    }
    let content_raw = row.content.as_deref()?;
    let content: Value = serde_json::from_str(content_raw).ok()?;
    let content_array = content.as_array()?;

    let api_type = map_block_type(&row.r#type);
    let has_children = !content_array.is_empty();
    let archived = row.alive != 1;
    let created_time = iso(row.created_time)?;
    let last_edited_time = iso(row.last_edited_time)?;

    let title_text = properties
        .get("title")
        .map(flatten_text)
        .unwrap_or_default();

    let payload = if RICH_TEXT_TYPES.contains(&api_type.as_str()) {
        json!({ "rich_text": richtext(&title_text), "color": "default" })
    } else if api_type == "to_do" {
        json!({ "rich_text": richtext(&title_text), "color": "default", "checked": false })
    } else if api_type == "child_page" {
        json!({ "title": title_text })
    } else if api_type == "divider" {
        json!({})
    } else {
        json!({})
    };

    let mut out = serde_json::Map::new();
    out.insert("object".into(), json!("block"));
    out.insert("id".into(), json!(row.id));
    out.insert("type".into(), json!(api_type.clone()));
    out.insert("created_time".into(), json!(created_time));
    out.insert("last_edited_time".into(), json!(last_edited_time));
    out.insert("has_children".into(), json!(has_children));
    out.insert("archived".into(), json!(archived));
    out.insert(api_type, payload);
    Some(Value::Object(out))
}
