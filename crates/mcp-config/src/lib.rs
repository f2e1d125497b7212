//! Environment-driven configuration for the router (spec.md §6).
//!
//! Every setting has a default; invalid values either fall back to that
//! default (booleans, the fast-path DB path, the pagination clamp) or raise
//! a startup [`ConfigError::Validation`] naming the variable and the
//! accepted form (cache TTL, cache max-entries, a path containing a null
//! byte) — exactly the split spec.md §6 prescribes.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Hard errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A numeric or path-shaped variable had a value that cannot be
    /// silently defaulted.
    #[error("invalid value for {variable}: {reason} (accepted: {accepted})")]
    Validation {
        /// The offending environment variable name.
        variable: String,
        /// Why the value was rejected.
        reason: String,
        /// Human-readable description of accepted values.
        accepted: String,
    },

    /// An overlay TOML file could not be read.
    #[error("config overlay file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// An overlay TOML file could not be parsed.
    #[error("failed to parse config overlay: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },
}

/// Advisory-level issues that do not prevent startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// The SQLite fast-path was requested without the trust gate.
    FastPathRequestedWithoutTrust,
    /// The response cache is disabled entirely.
    CacheDisabled,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FastPathRequestedWithoutTrust => write!(
                f,
                "fast-path cache was enabled but the trust gate was not; fast-path stays off"
            ),
            Self::CacheDisabled => write!(f, "response cache is disabled"),
        }
    }
}

const DEFAULT_CACHE_TTL_MS: u64 = 30_000;
const DEFAULT_CACHE_MAX_ENTRIES: usize = 300;
const DEFAULT_MAX_PAGE_SIZE: u32 = 100;

/// Top-level runtime configuration, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct RouterConfig {
    /// Master on/off switch for the response cache (C2).
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
    /// Cache entry time-to-live, in milliseconds.
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
    /// Maximum number of entries the cache retains.
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,
    /// On-disk cache file path; `None` means the built-in default.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
    /// Requests the SQLite fast-path (C3); still gated by `trust_enabled`.
    #[serde(default)]
    pub local_app_cache_enabled: bool,
    /// Mandatory trust gate for the SQLite fast-path.
    #[serde(default)]
    pub local_app_cache_trust_enabled: bool,
    /// Path to the third-party SQLite database.
    #[serde(default)]
    pub local_app_cache_db_path: Option<PathBuf>,
    /// Pagination clamp for `get-block-children`.
    #[serde(default = "default_max_page_size")]
    pub local_app_cache_max_page_size: u32,
    /// Base directory for OAuth token-cache files.
    #[serde(default)]
    pub token_cache_dir: Option<PathBuf>,
    /// Permits an `npx`-based launch of the remote backend.
    #[serde(default)]
    pub allow_npx_fallback: bool,
}

fn default_true() -> bool {
    true
}
fn default_cache_ttl_ms() -> u64 {
    DEFAULT_CACHE_TTL_MS
}
fn default_cache_max_entries() -> usize {
    DEFAULT_CACHE_MAX_ENTRIES
}
fn default_max_page_size() -> u32 {
    DEFAULT_MAX_PAGE_SIZE
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            cache_enabled: default_true(),
            cache_ttl_ms: default_cache_ttl_ms(),
            cache_max_entries: default_cache_max_entries(),
            cache_path: None,
            local_app_cache_enabled: false,
            local_app_cache_trust_enabled: false,
            local_app_cache_db_path: None,
            local_app_cache_max_page_size: default_max_page_size(),
            token_cache_dir: None,
            allow_npx_fallback: false,
        }
    }
}

impl RouterConfig {
    /// `true` iff both the fast-path flag and its trust gate are set.
    #[must_use]
    pub fn fast_path_active(&self) -> bool {
        self.local_app_cache_enabled && self.local_app_cache_trust_enabled
    }

    /// Load configuration from the recognized `MCP_ROUTER_*` environment
    /// variables, applying defaults for unset or invalid-but-recoverable
    /// values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for a non-positive cache TTL or
    /// entry cap, or a path containing a null byte.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        apply_env_overrides(&mut config)?;
        Ok(config)
    }

    /// Load an optional TOML overlay file and merge it on top of
    /// [`RouterConfig::from_env`] (overlay wins).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileNotFound`], [`ConfigError::ParseError`],
    /// or a [`ConfigError::Validation`] from the env pass.
    pub fn load(overlay_path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = Self::from_env()?;
        let Some(path) = overlay_path else {
            return Ok(base);
        };
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        let overlay: PartialRouterConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                reason: e.to_string(),
            })?;
        Ok(overlay.merge_onto(base))
    }

    /// Validate a loaded config and return advisory warnings.
    #[must_use]
    pub fn warnings(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        if self.local_app_cache_enabled && !self.local_app_cache_trust_enabled {
            warnings.push(ConfigWarning::FastPathRequestedWithoutTrust);
        }
        if !self.cache_enabled {
            warnings.push(ConfigWarning::CacheDisabled);
        }
        warnings
    }
}

/// Overlay shape: every field optional, so an overlay only needs to name
/// what it overrides.
#[derive(Debug, Default, Deserialize)]
struct PartialRouterConfig {
    cache_enabled: Option<bool>,
    cache_ttl_ms: Option<u64>,
    cache_max_entries: Option<usize>,
    cache_path: Option<PathBuf>,
    local_app_cache_enabled: Option<bool>,
    local_app_cache_trust_enabled: Option<bool>,
    local_app_cache_db_path: Option<PathBuf>,
    local_app_cache_max_page_size: Option<u32>,
    token_cache_dir: Option<PathBuf>,
    allow_npx_fallback: Option<bool>,
}

impl PartialRouterConfig {
    fn merge_onto(self, base: RouterConfig) -> RouterConfig {
        RouterConfig {
            cache_enabled: self.cache_enabled.unwrap_or(base.cache_enabled),
            cache_ttl_ms: self.cache_ttl_ms.unwrap_or(base.cache_ttl_ms),
            cache_max_entries: self.cache_max_entries.unwrap_or(base.cache_max_entries),
            cache_path: self.cache_path.or(base.cache_path),
            local_app_cache_enabled: self
                .local_app_cache_enabled
                .unwrap_or(base.local_app_cache_enabled),
            local_app_cache_trust_enabled: self
                .local_app_cache_trust_enabled
                .unwrap_or(base.local_app_cache_trust_enabled),
            local_app_cache_db_path: self.local_app_cache_db_path.or(base.local_app_cache_db_path),
            local_app_cache_max_page_size: self
                .local_app_cache_max_page_size
                .unwrap_or(base.local_app_cache_max_page_size),
            token_cache_dir: self.token_cache_dir.or(base.token_cache_dir),
            allow_npx_fallback: self.allow_npx_fallback.unwrap_or(base.allow_npx_fallback),
        }
    }
}

fn env_bool(key: &str, current: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => current,
    }
}

fn env_path(key: &str, current: Option<PathBuf>) -> Option<PathBuf> {
    match std::env::var(key) {
        Ok(v) if v.is_empty() => current,
        Ok(v) if v.contains('\0') => current,
        Ok(v) => Some(PathBuf::from(v)),
        Err(_) => current,
    }
}

/// Apply `MCP_ROUTER_*` environment variable overrides onto `config`.
fn apply_env_overrides(config: &mut RouterConfig) -> Result<(), ConfigError> {
    config.cache_enabled = env_bool("MCP_ROUTER_CACHE_ENABLED", config.cache_enabled);

    if let Ok(v) = std::env::var("MCP_ROUTER_CACHE_TTL_MS") {
        let parsed: i64 = v.parse().map_err(|_| validation_err(
            "MCP_ROUTER_CACHE_TTL_MS",
            "not an integer",
        ))?;
        if parsed <= 0 {
            return Err(validation_err(
                "MCP_ROUTER_CACHE_TTL_MS",
                "must be a positive integer number of milliseconds",
            ));
        }
        config.cache_ttl_ms = parsed as u64;
    }

    if let Ok(v) = std::env::var("MCP_ROUTER_CACHE_MAX_ENTRIES") {
        let parsed: i64 = v.parse().map_err(|_| validation_err(
            "MCP_ROUTER_CACHE_MAX_ENTRIES",
            "not an integer",
        ))?;
        if parsed <= 0 {
            return Err(validation_err(
                "MCP_ROUTER_CACHE_MAX_ENTRIES",
                "must be a positive integer",
            ));
        }
        config.cache_max_entries = parsed as usize;
    }

    if let Ok(v) = std::env::var("MCP_ROUTER_CACHE_PATH") {
        if v.contains('\0') {
            return Err(validation_err(
                "MCP_ROUTER_CACHE_PATH",
                "must not contain a null byte",
            ));
        }
        if !v.is_empty() {
            config.cache_path = Some(PathBuf::from(v));
        }
    }

    config.local_app_cache_enabled =
        env_bool("MCP_ROUTER_LOCAL_APP_CACHE_ENABLED", config.local_app_cache_enabled);
    config.local_app_cache_trust_enabled = env_bool(
        "MCP_ROUTER_LOCAL_APP_CACHE_TRUST_ENABLED",
        config.local_app_cache_trust_enabled,
    );
    config.local_app_cache_db_path =
        env_path("MCP_ROUTER_LOCAL_APP_CACHE_DB_PATH", config.local_app_cache_db_path.clone());

    if let Ok(v) = std::env::var("MCP_ROUTER_LOCAL_APP_CACHE_MAX_PAGE_SIZE") {
        if let Ok(parsed) = v.parse::<u32>() {
            if parsed >= 1 {
                config.local_app_cache_max_page_size = parsed;
            }
        }
        // Invalid values fall back to the existing/default clamp silently.
    }

    config.token_cache_dir = env_path("MCP_ROUTER_TOKEN_CACHE_DIR", config.token_cache_dir.clone());
    config.allow_npx_fallback =
        env_bool("MCP_ROUTER_ALLOW_NPX_FALLBACK", config.allow_npx_fallback);

    Ok(())
}

fn validation_err(variable: &str, reason: &str) -> ConfigError {
    ConfigError::Validation {
        variable: variable.to_string(),
        reason: reason.to_string(),
        accepted: match variable {
            "MCP_ROUTER_CACHE_TTL_MS" => "positive integer milliseconds".to_string(),
            "MCP_ROUTER_CACHE_MAX_ENTRIES" => "positive integer".to_string(),
            "MCP_ROUTER_CACHE_PATH" => "a filesystem path without a null byte".to_string(),
            other => other.to_string(),
        },
    }
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for key in [
            "MCP_ROUTER_CACHE_ENABLED",
            "MCP_ROUTER_CACHE_TTL_MS",
            "MCP_ROUTER_CACHE_MAX_ENTRIES",
            "MCP_ROUTER_CACHE_PATH",
            "MCP_ROUTER_LOCAL_APP_CACHE_ENABLED",
            "MCP_ROUTER_LOCAL_APP_CACHE_TRUST_ENABLED",
            "MCP_ROUTER_LOCAL_APP_CACHE_DB_PATH",
            "MCP_ROUTER_LOCAL_APP_CACHE_MAX_PAGE_SIZE",
            "MCP_ROUTER_TOKEN_CACHE_DIR",
            "MCP_ROUTER_ALLOW_NPX_FALLBACK",
        ] {
            unsafe { std::env::remove_var(key) };
        }
    }

    #[test]
    fn default_config_has_cache_enabled_and_fast_path_off() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        let cfg = RouterConfig::from_env().unwrap();
        assert!(cfg.cache_enabled);
        assert!(!cfg.fast_path_active());
        assert_eq!(cfg.cache_ttl_ms, DEFAULT_CACHE_TTL_MS);
    }

    #[test]
    fn invalid_ttl_raises_validation_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        unsafe { std::env::set_var("MCP_ROUTER_CACHE_TTL_MS", "0") };
        let err = RouterConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
        clear_env();
    }

    #[test]
    fn invalid_max_entries_raises_validation_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        unsafe { std::env::set_var("MCP_ROUTER_CACHE_MAX_ENTRIES", "-5") };
        let err = RouterConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
        clear_env();
    }

    #[test]
    fn null_byte_in_cache_path_raises_validation_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        unsafe { std::env::set_var("MCP_ROUTER_CACHE_PATH", "/tmp/\0bad") };
        let err = RouterConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
        clear_env();
    }

    #[test]
    fn empty_cache_path_means_default() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        unsafe { std::env::set_var("MCP_ROUTER_CACHE_PATH", "") };
        let cfg = RouterConfig::from_env().unwrap();
        assert!(cfg.cache_path.is_none());
        clear_env();
    }

    #[test]
    fn invalid_max_page_size_falls_back_to_default() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        unsafe { std::env::set_var("MCP_ROUTER_LOCAL_APP_CACHE_MAX_PAGE_SIZE", "not-a-number") };
        let cfg = RouterConfig::from_env().unwrap();
        assert_eq!(cfg.local_app_cache_max_page_size, DEFAULT_MAX_PAGE_SIZE);
        clear_env();
    }

    #[test]
    fn fast_path_requires_both_flags() {
        let mut cfg = RouterConfig::default();
        cfg.local_app_cache_enabled = true;
        assert!(!cfg.fast_path_active());
        let warnings = cfg.warnings();
        assert!(warnings.contains(&ConfigWarning::FastPathRequestedWithoutTrust));
        cfg.local_app_cache_trust_enabled = true;
        assert!(cfg.fast_path_active());
    }

    #[test]
    fn overlay_file_wins_over_env() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlay.toml");
        std::fs::write(&path, "cache_max_entries = 9000\n").unwrap();
        let cfg = RouterConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.cache_max_entries, 9000);
        clear_env();
    }

    #[test]
    fn missing_overlay_file_is_an_error() {
        let err = RouterConfig::load(Some(Path::new("/no/such/overlay.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }
}
