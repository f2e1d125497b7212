mod block;
mod children;
mod page;
mod richtext;
mod row;
mod uuid_id;

pub use block::{map_block_type, project_block};
pub use children::paginate_children;
pub use page::project_page;
pub use richtext::{flatten_text, project_properties, richtext};
pub use row::Row;
pub use uuid_id::{normalize_id, without_dashes};

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// Read-only handle onto the local third-party SQLite database backing
/// the fast path (spec.md §4.3). Every public method validates its id
/// argument and the row shape before projecting; any failure is a
/// `None` result, never a panic or a propagated SQL error.
///
/// `rusqlite::Connection` is `Send` but not `Sync`; the mutex is what
/// makes a shared `FastPath` usable from the router's `Box<dyn Backend>`,
/// matching spec.md §5's "otherwise serialize" policy for this transport.
pub struct FastPath {
    conn: Mutex<Connection>,
    max_page_size: u32,
}

impl FastPath {
    /// Open the database at `path` read-only. Returns `None` (and logs)
    /// if the file is missing or unreadable — the caller falls through
    /// to the remote backend rather than surfacing an error.
    pub fn open(path: &Path, max_page_size: u32) -> Option<Self> {
        match Connection::open_with_flags(path, rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY) {
            Ok(conn) => Some(Self { conn: Mutex::new(conn), max_page_size }),
            Err(err) => {
                tracing::warn!(error = %err, path = %path.display(), "fastpath db unreadable, skipping");
                None
            }
        }
    }

    fn fetch_row(&self, id: &str) -> Option<Row> {
        self.conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .query_row(
                "SELECT id, type, parent_table, parent_id, space_id, created_time, last_edited_time, alive, properties, content, meta_last_access_timestamp \
                 FROM blocks WHERE id = ?1",
                params![id],
                row_from_sql,
            )
            .optional()
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, id, "fastpath query failed, treating as miss");
                None
            })
    }

    /// Same row shape as [`FastPath::fetch_row`] but restricted to `type='page'`
    /// and ordered so a duplicate id resolves to the most recently accessed row.
    fn fetch_page_row(&self, id: &str) -> Option<Row> {
        self.conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .query_row(
                "SELECT id, type, parent_table, parent_id, space_id, created_time, last_edited_time, alive, properties, content, meta_last_access_timestamp \
                 FROM blocks WHERE id = ?1 AND type = 'page' \
                 ORDER BY meta_last_access_timestamp DESC LIMIT 1",
                params![id],
                row_from_sql,
            )
            .optional()
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, id, "fastpath page query failed, treating as miss");
                None
            })
    }

    fn fetch_rows(&self, ids: &[String]) -> HashMap<String, Row> {
        let mut out = HashMap::with_capacity(ids.len());
        for id in ids {
            if let Some(row) = self.fetch_row(id) {
                out.insert(id.clone(), row);
            }
        }
        out
    }

    /// Retrieve a single page by id (spec.md §4.3 "Page projection").
    #[must_use]
    pub fn retrieve_a_page(&self, page_id: &str) -> Option<Value> {
        let id = normalize_id(page_id)?;
        let row = self.fetch_page_row(&id)?;
        project_page(&row)
    }

    /// Retrieve a single block by id (spec.md §4.3 "Block projection").
    #[must_use]
    pub fn retrieve_a_block(&self, block_id: &str) -> Option<Value> {
        let id = normalize_id(block_id)?;
        let row = self.fetch_row(&id)?;
        project_block(&row)
    }

    /// List a block's children (spec.md §4.3 "Children projection").
    #[must_use]
    pub fn get_block_children(
        &self,
        block_id: &str,
        page_size: Option<u32>,
        start_cursor: Option<&str>,
    ) -> Option<Value> {
        let id = normalize_id(block_id)?;
        let parent = self.fetch_row(&id)?;
        let content_raw = parent.content.as_deref()?;
        let content: Value = serde_json::from_str(content_raw).ok()?;
        let content_ids: Vec<String> = content
            .as_array()?
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect::<Option<_>>()?;

        let rows_by_id = self.fetch_rows(&content_ids);
        paginate_children(
            &content_ids,
            page_size,
            start_cursor,
            self.max_page_size,
            &rows_by_id,
        )
    }
}

fn row_from_sql(r: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
    Ok(Row {
        id: r.get(0)?,
        r#type: r.get(1)?,
        parent_table: r.get(2)?,
        parent_id: r.get(3)?,
        space_id: r.get(4)?,
        created_time: r.get(5)?,
        last_edited_time: r.get(6)?,
        alive: r.get(7)?,
        properties: r.get(8)?,
        content: r.get(9)?,
        meta_last_access_timestamp: r.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE blocks (
                id TEXT,
                type TEXT NOT NULL,
                parent_table TEXT,
                parent_id TEXT,
                space_id TEXT,
                created_time INTEGER NOT NULL,
                last_edited_time INTEGER NOT NULL,
                alive INTEGER NOT NULL,
                properties TEXT,
                content TEXT,
                meta_last_access_timestamp INTEGER NOT NULL
            );",
        )
        .unwrap();
        conn
    }

    fn insert_row(conn: &Connection, row: &Row) {
        conn.execute(
            "INSERT INTO blocks (id, type, parent_table, parent_id, space_id, created_time, last_edited_time, alive, properties, content, meta_last_access_timestamp) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                row.id,
                row.r#type,
                row.parent_table,
                row.parent_id,
                row.space_id,
                row.created_time,
                row.last_edited_time,
                row.alive,
                row.properties,
                row.content,
                row.meta_last_access_timestamp,
            ],
        )
        .unwrap();
    }

    fn fastpath_with(rows: &[Row]) -> FastPath {
        let conn = memory_db();
        for row in rows {
            insert_row(&conn, row);
        }
        FastPath { conn: Mutex::new(conn), max_page_size: 100 }
    }

    fn page_row() -> Row {
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
            content: Some(r#"["bbbbbbbb-bbbb-bbbb-bbbb-bbbbbbbbbbbb"]"#.to_string()),
            meta_last_access_timestamp: 1_700_000_002_000,
        }
    }

    fn block_row() -> Row {
        Row {
            id: "bbbbbbbb-bbbb-bbbb-bbbb-bbbbbbbbbbbb".into(),
            r#type: "text".into(),
            parent_table: Some("block".into()),
            parent_id: Some("aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa".into()),
            space_id: Some("space1".into()),
            created_time: 1_700_000_000_000,
            last_edited_time: 1_700_000_001_000,
            alive: 1,
            properties: Some(r#"{"title": [["hi"]]}"#.to_string()),
            content: Some("[]".to_string()),
            meta_last_access_timestamp: 1_700_000_002_000,
        }
    }

    #[test]
    fn retrieve_a_page_round_trips_through_sqlite() {
        let fp = fastpath_with(&[page_row(), block_row()]);
        let page = fp
            .retrieve_a_page("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")
            .unwrap();
        assert_eq!(page["object"], "page");
    }

    #[test]
    fn retrieve_a_page_rejects_non_page_rows() {
        let fp = fastpath_with(&[block_row()]);
        assert!(fp
            .retrieve_a_page("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb")
            .is_none());
    }

    #[test]
    fn retrieve_a_page_missing_id_is_none() {
        let fp = fastpath_with(&[]);
        assert!(fp
            .retrieve_a_page("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")
            .is_none());
    }

    #[test]
    fn retrieve_a_page_invalid_id_shape_is_none() {
        let fp = fastpath_with(&[page_row()]);
        assert!(fp.retrieve_a_page("not-a-uuid").is_none());
    }

    #[test]
    fn retrieve_a_page_picks_most_recently_accessed_duplicate() {
        let stale = Row {
            meta_last_access_timestamp: 1_700_000_001_000,
            properties: Some(r#"{"title": [["Stale"]]}"#.to_string()),
            ..page_row()
        };
        let fresh = Row {
            meta_last_access_timestamp: 1_700_000_005_000,
            properties: Some(r#"{"title": [["Fresh"]]}"#.to_string()),
            ..page_row()
        };
        let fp = fastpath_with(&[stale, fresh]);
        let page = fp
            .retrieve_a_page("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")
            .unwrap();
        assert_eq!(page["properties"]["title"]["title"][0]["plain_text"], "Fresh");
    }

    #[test]
    fn retrieve_a_block_round_trips_through_sqlite() {
        let fp = fastpath_with(&[block_row()]);
        let block = fp
            .retrieve_a_block("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb")
            .unwrap();
        assert_eq!(block["type"], "paragraph");
    }

    #[test]
    fn get_block_children_lists_page_contents() {
        let fp = fastpath_with(&[page_row(), block_row()]);
        let children = fp
            .get_block_children("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", None, None)
            .unwrap();
        assert_eq!(children["results"].as_array().unwrap().len(), 1);
        assert_eq!(children["has_more"], false);
    }

    #[test]
    fn get_block_children_missing_child_returns_none() {
        let fp = fastpath_with(&[page_row()]);
        assert!(fp
            .get_block_children("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", None, None)
            .is_none());
    }
}
