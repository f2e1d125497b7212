use crate::block::project_block;
use crate::row::Row;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Paginate a parent block's children (spec.md §4.3 "Children projection").
///
/// `rows_by_id` must already contain every row the caller fetched for the
/// ids in `content_ids` (a single `IN(...)` query at the call site); a
/// missing or unprojectable row aborts the whole page rather than
/// emitting a partial one.
#[must_use]
pub fn paginate_children(
    content_ids: &[String],
    page_size: Option<u32>,
    start_cursor: Option<&str>,
    max_page_size: u32,
    rows_by_id: &HashMap<String, Row>,
) -> Option<Value> {
    let page_size = page_size.unwrap_or(max_page_size).clamp(1, max_page_size) as usize;

    let start_index = match start_cursor {
        None => 0,
        Some(cursor) => content_ids.iter().position(|id| id == cursor)?,
    };

    let end_index = (start_index + page_size).min(content_ids.len());
    let page_ids = &content_ids[start_index..end_index];

    let mut results = Vec::with_capacity(page_ids.len());
    for id in page_ids {
        let row = rows_by_id.get(id)?;
        let projected = project_block(row)?;
        results.push(projected);
    }

    let has_more = end_index < content_ids.len();
    let next_cursor = if has_more {
        page_ids.last().cloned().map(Value::String)
    } else {
        None
    };

    Some(json!({
        "results": results,
        "next_cursor": next_cursor.unwrap_or(Value::Null),
        "has_more": has_more,
    }))
}
