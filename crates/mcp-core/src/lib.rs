//! Shared data model and canonicalization primitives for the router.
//!
//! This crate has no knowledge of transports or backends; it defines the
//! vocabulary (tool descriptors, route entries, cache entries) that every
//! other crate in the workspace builds on, plus the deterministic
//! JSON-canonicalization and hashing primitives the cache-key builder needs.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

mod result;
mod route;
mod tool;

pub use result::{ToolContent, ToolResult};
pub use route::{RouteEntry, RouteMode};
pub use tool::ToolDescriptor;

/// Errors raised by the canonicalization helpers in this crate.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// JSON serialization or deserialization failed.
    #[error("failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Produce a deterministic JSON string suitable for hashing.
///
/// Not a full JCS implementation, but stable for the values this router
/// ever hashes: object keys are sorted (`serde_json::Map` is a `BTreeMap`
/// by default) and numbers round-trip consistently through `serde_json`.
///
/// # Errors
///
/// Returns [`CoreError::Json`] if `value` cannot be serialized, which also
/// covers the "circular structure" case spec.md §4.1 calls out — a cyclic
/// Rust value cannot be constructed in the first place, so that failure
/// mode degenerates to an ordinary serialization error here.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, CoreError> {
    let v = serde_json::to_value(value)?;
    Ok(serde_json::to_string(&v)?)
}

/// Compute the hex-encoded SHA-256 digest of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Identity metadata for a connected backend, surfaced in logs and in the
/// `doctor` CLI subcommand.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BackendIdentity {
    /// Stable short name (`"local"` or `"remote"`).
    pub id: String,
    /// Free-form version string reported by the backend, if any.
    pub version: Option<String>,
}

/// An entry in the bounded response cache (C2).
///
/// `V` is the opaque JSON response payload; the cache never inspects it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    /// The cached value.
    pub value: V,
    /// Milliseconds since epoch when this key was first inserted.
    pub created_at: i64,
    /// Milliseconds since epoch of the most recent overwrite.
    pub updated_at: i64,
    /// Milliseconds since epoch of the most recent read hit.
    pub accessed_at: i64,
}

/// On-disk shape of the cache file (§3 "Cache file").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheFile<V> {
    /// File format version. Anything other than [`CACHE_FILE_VERSION`]
    /// must be treated as absent by the loader.
    pub version: u32,
    /// Keyed entries, keyed by the C1 cache key string.
    pub entries: std::collections::BTreeMap<String, CacheEntry<V>>,
}

/// Current on-disk cache file version.
pub const CACHE_FILE_VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_object_keys() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
    }

    #[test]
    fn canonical_json_preserves_array_order() {
        let a = json!([1, 2, 3]);
        let b = json!([3, 2, 1]);
        assert_ne!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
    }

    #[test]
    fn sha256_hex_is_stable() {
        let h1 = sha256_hex(b"hello");
        let h2 = sha256_hex(b"hello");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn sha256_hex_differs_on_different_input() {
        assert_ne!(sha256_hex(b"a"), sha256_hex(b"b"));
    }

    proptest::proptest! {
        #[test]
        fn canonical_json_is_order_independent_over_two_keys(a in 0i64..1000, b in 0i64..1000) {
            let forward = json!({"a": a, "b": b});
            let reversed = serde_json::json!({"b": b, "a": a});
            assert_eq!(canonical_json(&forward).unwrap(), canonical_json(&reversed).unwrap());
        }
    }
}
