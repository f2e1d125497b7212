//! Loads the pre-generated operations catalog the (out-of-scope)
//! OpenAPI→tool-descriptor converter produces (spec.md §2 "Deliberately
//! out of scope").
//!
//! The catalog is a JSON file `{ "operations": [...], "allowlist": {...} }`
//! where each operation matches [`mcp_local::OperationSpec`]'s shape and
//! `allowlist` maps operation-id to the one HTTP method permitted for it.

use mcp_local::OperationSpec;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CatalogFile {
    operations: Vec<OperationSpec>,
    #[serde(default)]
    allowlist: BTreeMap<String, String>,
}

/// Read and parse the operations catalog at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not parse as a
/// [`CatalogFile`].
pub fn load(path: &Path) -> anyhow::Result<(Vec<OperationSpec>, BTreeMap<String, String>)> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read operations catalog {}: {e}", path.display()))?;
    let catalog: CatalogFile = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("failed to parse operations catalog {}: {e}", path.display()))?;
    Ok((catalog.operations, catalog.allowlist))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_operations_and_allowlist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"{
                "operations": [
                    {
                        "tool_name": "retrieve-a-page",
                        "description": "Get a page",
                        "input_schema": {"type": "object"},
                        "method": "GET",
                        "path": "/v1/pages/{page_id}",
                        "operation_id": "retrieve-a-page"
                    }
                ],
                "allowlist": {"retrieve-a-page": "GET"}
            }"#,
        )
        .unwrap();

        let (operations, allowlist) = load(&path).unwrap();
        assert_eq!(operations.len(), 1);
        assert_eq!(allowlist.get("retrieve-a-page"), Some(&"GET".to_string()));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load(Path::new("/no/such/catalog.json")).is_err());
    }
}
