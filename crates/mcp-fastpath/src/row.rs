/// A raw row read from the third-party SQLite database (spec.md §3
/// "SQLite row").
pub struct Row {
    /// Row id (already UUID-normalized).
    pub id: String,
    /// Local type tag (`"page"`, `"text"`, `"header"`, ...).
    pub r#type: String,
    /// Parent collection kind (`"workspace"`, `"space"`, ...), if any.
    pub parent_table: Option<String>,
    /// Parent id, if any.
    pub parent_id: Option<String>,
    /// Owning space id, if any.
    pub space_id: Option<String>,
    /// Creation timestamp, milliseconds since epoch.
    pub created_time: i64,
    /// Last-edit timestamp, milliseconds since epoch.
    pub last_edited_time: i64,
    /// `1` iff the row has not been soft-deleted.
    pub alive: i64,
    /// Raw JSON text of the `properties` column.
    pub properties: Option<String>,
    /// Raw JSON text of the `content` column (array of child ids).
    pub content: Option<String>,
    /// Last-access timestamp, milliseconds since epoch; breaks ties when a
    /// page lookup matches more than one row for the same id.
    pub meta_last_access_timestamp: i64,
}
