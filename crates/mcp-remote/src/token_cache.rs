use serde::Serialize;
use std::fs;
use std::path::Path;

/// MD5 hex digest of `input` (spec.md §3 "Token-cache artifact" hash).
#[must_use]
pub fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

/// Outcome of a reauth token-cache eviction (spec.md §4.5 "Reauth").
#[derive(Debug, Clone, Serialize)]
pub struct ReauthSummary {
    pub status: &'static str,
    pub deleted_files: usize,
    pub searched_dirs: usize,
    pub message: String,
}

/// Delete every token-cache file under `base_dir` whose name is prefixed
/// by the MD5 hash of `url`, preserving every other file (spec.md §4.5).
///
/// Never fails on a missing or unreadable directory — that just means
/// nothing was cached yet.
pub fn evict_token_cache(base_dir: &Path, url: &str) -> ReauthSummary {
    let hash = md5_hex(url);
    let mut deleted_files = 0usize;
    let mut searched_dirs = 0usize;

    let Ok(top_entries) = fs::read_dir(base_dir) else {
        return ReauthSummary {
            status: "reauth_triggered",
            deleted_files: 0,
            searched_dirs: 0,
            message: format!("token-cache base dir {} not found", base_dir.display()),
        };
    };

    for entry in top_entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if name == hash {
            searched_dirs += 1;
            deleted_files += evict_file(&path.join("tokens.json"));
        } else if name.starts_with("mcp-remote-") {
            searched_dirs += 1;
            deleted_files += evict_mcp_remote_dir(&path, &hash);
        }
    }

    ReauthSummary {
        status: "reauth_triggered",
        deleted_files,
        searched_dirs,
        message: format!("evicted {deleted_files} token-cache file(s) for hash {hash}"),
    }
}

fn evict_mcp_remote_dir(dir: &Path, hash: &str) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    let mut deleted = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if path.is_dir() {
            if name == hash {
                deleted += evict_file(&path.join("tokens.json"));
            }
            continue;
        }

        let matches = [
            format!("{hash}_tokens.json"),
            format!("{hash}_client_info.json"),
            format!("{hash}_code_verifier.txt"),
        ]
        .iter()
        .any(|candidate| *candidate == name);

        if matches {
            deleted += evict_file(&path);
        }
    }
    deleted
}

fn evict_file(path: &Path) -> usize {
    match fs::remove_file(path) {
        Ok(()) => 1,
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{create_dir_all, write};
    use tempfile::tempdir;

    #[test]
    fn md5_hex_is_stable() {
        assert_eq!(md5_hex("https://example.com"), md5_hex("https://example.com"));
        assert_ne!(md5_hex("https://example.com"), md5_hex("https://other.com"));
    }

    #[test]
    fn evicts_matching_files_preserves_others() {
        let base = tempdir().unwrap();
        let hash = md5_hex("https://example.com/mcp");
        let versioned = base.path().join("mcp-remote-1.0");
        create_dir_all(&versioned).unwrap();
        write(versioned.join(format!("{hash}_tokens.json")), "{}").unwrap();
        write(versioned.join(format!("{hash}_client_info.json")), "{}").unwrap();
        write(versioned.join("other_tokens.json"), "{}").unwrap();

        let summary = evict_token_cache(base.path(), "https://example.com/mcp");
        assert_eq!(summary.deleted_files, 2);
        assert!(!versioned.join(format!("{hash}_tokens.json")).exists());
        assert!(versioned.join("other_tokens.json").exists());
    }

    #[test]
    fn evicts_nested_hash_directory_form() {
        let base = tempdir().unwrap();
        let hash = md5_hex("https://example.com/mcp");
        let nested = base.path().join(&hash);
        create_dir_all(&nested).unwrap();
        write(nested.join("tokens.json"), "{}").unwrap();

        let summary = evict_token_cache(base.path(), "https://example.com/mcp");
        assert_eq!(summary.deleted_files, 1);
        assert!(!nested.join("tokens.json").exists());
    }

    #[test]
    fn missing_base_dir_is_not_an_error() {
        let base = tempdir().unwrap();
        let missing = base.path().join("does-not-exist");
        let summary = evict_token_cache(&missing, "https://example.com/mcp");
        assert_eq!(summary.deleted_files, 0);
    }
}
