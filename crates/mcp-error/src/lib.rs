//! Unified error taxonomy for the router, organized by *effect* rather than
//! by type name (spec.md §7).
//!
//! Every [`McpError`] carries a stable [`ErrorCode`], a human-readable
//! message, an optional cause chain, and arbitrary key-value context. Build
//! one fluently with [`McpError::new`].
#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Broad effect family an [`ErrorCode`] belongs to — spec.md §7's taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed user/config input; surfaced to the caller, never swallowed.
    ValidationFailure,
    /// Single-call failure against the remote backend; triggers one
    /// reconnect+retry at C5.
    TransientBackendFailure,
    /// Connect timeout or exhausted retry; backend marked unavailable.
    PermanentBackendUnavailable,
    /// Invalid cache file/version; silently reset, never surfaced.
    CacheCorruption,
    /// Schema or ID validation failure in the SQLite fast-path; silent miss.
    LocalFastPathValidationMiss,
    /// Tool not on the read-only allowlist.
    PolicyViolation,
    /// Bugs; fail fast with a descriptive message.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ValidationFailure => "validation_failure",
            Self::TransientBackendFailure => "transient_backend_failure",
            Self::PermanentBackendUnavailable => "permanent_backend_unavailable",
            Self::CacheCorruption => "cache_corruption",
            Self::LocalFastPathValidationMiss => "local_fast_path_validation_miss",
            Self::PolicyViolation => "policy_violation",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Machine-readable, stable error code. Serializes to `SCREAMING_SNAKE_CASE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Config value failed validation (bad TTL, bad path, etc).
    ConfigInvalid,
    /// Incoming tool-call arguments failed schema/shape validation.
    InvalidArguments,
    /// The remote backend RPC failed once; a reconnect+retry is in flight.
    BackendTransientFailure,
    /// Connect (or reconnect) exceeded its deadline.
    BackendTimeout,
    /// The remote backend is unavailable after the single retry.
    BackendUnavailable,
    /// Cache file was corrupt or had an unknown version.
    CacheFileCorrupt,
    /// Fast-path row failed UUID/schema validation.
    FastPathValidationMiss,
    /// Requested operation is not on the read-only allowlist.
    ReadOnlyOperationBlocked,
    /// Tool name does not resolve to any known operation.
    UnknownTool,
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigInvalid | Self::InvalidArguments => ErrorCategory::ValidationFailure,
            Self::BackendTransientFailure => ErrorCategory::TransientBackendFailure,
            Self::BackendTimeout | Self::BackendUnavailable => {
                ErrorCategory::PermanentBackendUnavailable
            }
            Self::CacheFileCorrupt => ErrorCategory::CacheCorruption,
            Self::FastPathValidationMiss => ErrorCategory::LocalFastPathValidationMiss,
            Self::ReadOnlyOperationBlocked | Self::UnknownTool => ErrorCategory::PolicyViolation,
            Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Stable `&'static str` representation (e.g. `"BACKEND_TIMEOUT"`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigInvalid => "CONFIG_INVALID",
            Self::InvalidArguments => "INVALID_ARGUMENTS",
            Self::BackendTransientFailure => "BACKEND_TRANSIENT_FAILURE",
            Self::BackendTimeout => "BACKEND_TIMEOUT",
            Self::BackendUnavailable => "BACKEND_UNAVAILABLE",
            Self::CacheFileCorrupt => "CACHE_FILE_CORRUPT",
            Self::FastPathValidationMiss => "FAST_PATH_VALIDATION_MISS",
            Self::ReadOnlyOperationBlocked => "READ_ONLY_OPERATION_BLOCKED",
            Self::UnknownTool => "UNKNOWN_TOOL",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified router error: a stable code, a message, an optional cause, and
/// structured context for diagnostics.
///
/// ```
/// use mcp_error::{McpError, ErrorCode};
///
/// let err = McpError::new(ErrorCode::BackendTimeout, "connect timed out after 30s")
///     .with_context("backend", "remote")
///     .with_context("deadline_ms", 30_000);
/// ```
pub struct McpError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl McpError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if
    /// serialization fails, the entry is silently skipped.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }
}

impl fmt::Debug for McpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("McpError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for McpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for McpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn basic_construction() {
        let err = McpError::new(ErrorCode::Internal, "boom");
        assert_eq!(err.code, ErrorCode::Internal);
        assert!(err.source.is_none());
        assert!(err.context.is_empty());
    }

    #[test]
    fn display_without_context() {
        let err = McpError::new(ErrorCode::UnknownTool, "no such tool");
        assert_eq!(err.to_string(), "[UNKNOWN_TOOL] no such tool");
    }

    #[test]
    fn display_with_context() {
        let err = McpError::new(ErrorCode::BackendTimeout, "timed out")
            .with_context("timeout_ms", 30_000);
        let s = err.to_string();
        assert!(s.starts_with("[BACKEND_TIMEOUT] timed out"));
        assert!(s.contains("timeout_ms"));
    }

    #[test]
    fn debug_with_source() {
        let src = io::Error::new(io::ErrorKind::NotFound, "db missing");
        let err = McpError::new(ErrorCode::Internal, "init failed").with_source(src);
        let dbg = format!("{err:?}");
        assert!(dbg.contains("source"));
        assert!(dbg.contains("db missing"));
    }

    #[test]
    fn every_code_maps_to_expected_category() {
        assert_eq!(
            ErrorCode::ReadOnlyOperationBlocked.category(),
            ErrorCategory::PolicyViolation
        );
        assert_eq!(
            ErrorCode::CacheFileCorrupt.category(),
            ErrorCategory::CacheCorruption
        );
        assert_eq!(
            ErrorCode::FastPathValidationMiss.category(),
            ErrorCategory::LocalFastPathValidationMiss
        );
    }

    #[test]
    fn code_serializes_screaming_snake_case() {
        let v = serde_json::to_value(ErrorCode::BackendUnavailable).unwrap();
        assert_eq!(v, serde_json::json!("BACKEND_UNAVAILABLE"));
    }
}
