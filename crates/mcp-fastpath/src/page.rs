use crate::richtext::project_properties;
use crate::row::Row;
use crate::uuid_id::without_dashes;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

fn iso(millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(millis).map(|dt| dt.to_rfc3339())
}

/// Project a `type='page'` row into the external API's page shape
/// (spec.md §4.3 "Page projection"). Returns `None` on any validation
/// failure — the caller falls through to the network path.
#[must_use]
pub fn project_page(row: &Row) -> Option<Value> {
    let properties_raw = row.properties.as_deref()?;
    let properties: Value = serde_json::from_str(properties_raw).ok()?;
    let projected_properties = project_properties(&properties)?;
    let created_time = iso(row.created_time)?;
    let last_edited_time = iso(row.last_edited_time)?;
    let archived = row.alive != 1;

    let parent = match (&row.parent_table, &row.parent_id) {
        (Some(table), Some(id)) if !table.is_empty() && !id.is_empty() => {
            Some(json!({ "type": format!("{table}_id"), format!("{table}_id"): id }))
        }
        _ => None,
    };

    let mut out = serde_json::Map::new();
    out.insert("object".into(), json!("page"));
    out.insert("id".into(), json!(row.id));
    out.insert("created_time".into(), json!(created_time));
    out.insert("last_edited_time".into(), json!(last_edited_time));
    out.insert("archived".into(), json!(archived));
    out.insert("in_trash".into(), json!(archived));
    out.insert(
        "url".into(),
        json!(format!("https://www.notion.so/{}", without_dashes(&row.id))),
    );
    if let Some(parent) = parent {
        out.insert("parent".into(), parent);
    }
    out.insert("properties".into(), projected_properties);
    Some(Value::Object(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_row() -> Row {
        Row {
            id: "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa".into(),
            r#type: "page".into(),
            parent_table: Some("workspace".into()),
            parent_id: Some("ws1".into()),
            space_id: Some("space1".into()),
            created_time: 1_700_000_000_000,
            last_edited_time: 1_700_000_001_000,
            alive: 1,
            properties: Some(r#"{"title": [["Hello"]]}"#.to_string()),
            content: None,
            meta_last_access_timestamp: 1_700_000_002_000,
        }
    }

    #[test]
    fn projects_a_valid_page() {
        let row = base_row();
        let page = project_page(&row).unwrap();
        assert_eq!(page["object"], "page");
        assert_eq!(page["archived"], false);
        assert!(page["url"].as_str().unwrap().starts_with("https://www.notion.so/"));
        assert!(!page["url"].as_str().unwrap().contains('-'));
        assert_eq!(page["properties"]["title"]["title"][0]["plain_text"], "Hello");
    }

    #[test]
    fn parent_omitted_when_missing() {
        let mut row = base_row();
        row.parent_table = None;
        row.parent_id = None;
        let page = project_page(&row).unwrap();
        assert!(page.get("parent").is_none());
    }

    #[test]
    fn archived_true_when_not_alive() {
        let mut row = base_row();
        row.alive = 0;
        let page = project_page(&row).unwrap();
        assert_eq!(page["archived"], true);
        assert_eq!(page["in_trash"], true);
    }

    #[test]
    fn none_when_properties_not_json_object() {
        let mut row = base_row();
        row.properties = Some("[1,2,3]".to_string());
        assert!(project_page(&row).is_none());
    }

    #[test]
    fn none_when_properties_missing() {
        let mut row = base_row();
        row.properties = None;
        assert!(project_page(&row).is_none());
    }

    #[test]
    fn none_when_title_not_array() {
        let mut row = base_row();
        row.properties = Some(r#"{"title": "not-an-array"}"#.to_string());
        assert!(project_page(&row).is_none());
    }
}
