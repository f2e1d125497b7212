//! Cache-key builder (C1) and bounded TTL/LRU response cache (C2).
//!
//! spec.md §4.1–§4.2.
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod key;

pub use cache::ResponseCache;
pub use key::{auth_fingerprint, cache_key, Operation};

/// Reserved argument field that bypasses the response cache and the
/// SQLite fast-path for a single call without invalidating the cache
/// (spec.md §4.2 "Control field").
pub const FORCE_REFRESH_FIELD: &str = "__mcpFastForceRefresh";

/// Split `__mcpFastForceRefresh` off a call's argument object, returning
/// `(force_refresh, sanitized_args)`. Total and infallible — a missing or
/// non-boolean field is treated as `false` (spec.md §9 "the split function
/// must be total and never throw").
#[must_use]
pub fn split_control_fields(mut args: serde_json::Value) -> (bool, serde_json::Value) {
    let force_refresh = match &mut args {
        serde_json::Value::Object(map) => map
            .remove(FORCE_REFRESH_FIELD)
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        _ => false,
    };
    (force_refresh, args)
}
