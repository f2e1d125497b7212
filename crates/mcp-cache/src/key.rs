use serde::Serialize;
use serde_json::Value;

/// The `{method, path, operation_id?}` triple a cache key is built from
/// (spec.md §4.1).
#[derive(Debug, Clone, Serialize)]
pub struct Operation {
    /// HTTP method, upper-cased before hashing.
    pub method: String,
    /// OpenAPI path template.
    pub path: String,
    /// Operation id, if the OpenAPI description names one.
    pub operation_id: Option<String>,
}

impl Operation {
    /// Construct an operation descriptor, upper-casing `method`.
    #[must_use]
    pub fn new(method: impl Into<String>, path: impl Into<String>, operation_id: Option<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            path: path.into(),
            operation_id,
        }
    }
}

#[derive(Serialize)]
struct HashInput<'a> {
    operation: &'a Operation,
    params: &'a Value,
}

/// Build the C1 cache key: `"openapi-cache:v1:<METHOD>:<PATH>:<OP_ID|->:<hex-sha256>"`.
///
/// The hash input is the canonical serialization of `{operation, params}`;
/// canonical serialization sorts object keys but preserves array order, so
/// two structurally-equal-up-to-key-order param trees always hash to the
/// same key (spec.md §8's first invariant).
///
/// # Errors
///
/// Returns [`mcp_core::CoreError`] if `params` cannot be canonicalized.
pub fn cache_key(operation: &Operation, params: &Value) -> Result<String, mcp_core::CoreError> {
    let op_id = operation.operation_id.as_deref().unwrap_or("-");
    let input = HashInput { operation, params };
    let canonical = mcp_core::canonical_json(&input)?;
    let hash = mcp_core::sha256_hex(canonical.as_bytes());
    Ok(format!(
        "openapi-cache:v1:{}:{}:{}:{}",
        operation.method, operation.path, op_id, hash
    ))
}

/// SHA-256 of `"<authorization>|<api-version>"`, injected into the params
/// tree under a reserved key so a credential change invalidates every
/// cached entry (spec.md §4.4 step 4, glossary "Fingerprint").
#[must_use]
pub fn auth_fingerprint(authorization: &str, api_version: &str) -> String {
    mcp_core::sha256_hex(format!("{authorization}|{api_version}").as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn same_params_different_key_order_same_cache_key() {
        let op = Operation::new("get", "/pages/{id}", Some("retrieve-a-page".into()));
        let p1 = json!({"a": 1, "b": 2});
        let p2 = json!({"b": 2, "a": 1});
        assert_eq!(cache_key(&op, &p1).unwrap(), cache_key(&op, &p2).unwrap());
    }

    #[test]
    fn array_order_changes_key() {
        let op = Operation::new("get", "/blocks/{id}/children", None);
        let p1 = json!({"ids": [1, 2]});
        let p2 = json!({"ids": [2, 1]});
        assert_ne!(cache_key(&op, &p1).unwrap(), cache_key(&op, &p2).unwrap());
    }

    #[test]
    fn method_is_upper_cased_in_key() {
        let op = Operation::new("get", "/p", None);
        let key = cache_key(&op, &json!({})).unwrap();
        assert!(key.contains(":GET:"));
    }

    #[test]
    fn missing_operation_id_becomes_dash() {
        let op = Operation::new("GET", "/p", None);
        let key = cache_key(&op, &json!({})).unwrap();
        assert!(key.contains(":-:"));
    }

    #[test]
    fn different_auth_fingerprint_changes_key() {
        let op = Operation::new("get", "/p", None);
        let fp1 = auth_fingerprint("Bearer a", "v1");
        let fp2 = auth_fingerprint("Bearer b", "v1");
        assert_ne!(fp1, fp2);
        let p1 = json!({"__ctx": {"auth_fingerprint": fp1}});
        let p2 = json!({"__ctx": {"auth_fingerprint": fp2}});
        assert_ne!(cache_key(&op, &p1).unwrap(), cache_key(&op, &p2).unwrap());
    }

    proptest::proptest! {
        #[test]
        fn cache_key_is_stable_for_repeated_calls(
            method in "[a-z]{1,8}",
            path in "/[a-z]{1,8}",
            a in 0i64..1000,
            b in 0i64..1000,
        ) {
            let op = Operation::new(method, path, None);
            let params = json!({"a": a, "b": b});
            assert_eq!(cache_key(&op, &params).unwrap(), cache_key(&op, &params).unwrap());
        }
    }
}
