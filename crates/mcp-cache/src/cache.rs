use mcp_core::{CacheEntry, CacheFile, CACHE_FILE_VERSION};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Injectable wall-clock, in milliseconds since epoch — lets tests pin time.
pub type Clock = Box<dyn Fn() -> i64 + Send + Sync>;

fn system_clock() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Bounded TTL+LRU response cache (C2, spec.md §4.2).
///
/// All mutation happens behind a single internal lock; disk I/O
/// (`load`/`save`) happens outside any lock held during a tool call, per
/// spec.md §5's "forbid holding a lock across I/O".
pub struct ResponseCache<V> {
    ttl_ms: i64,
    max_entries: usize,
    path: Option<PathBuf>,
    clock: Clock,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> ResponseCache<V> {
    /// Construct a cache with the system clock.
    #[must_use]
    pub fn new(ttl_ms: u64, max_entries: usize, path: Option<PathBuf>) -> Self {
        Self::with_clock(ttl_ms, max_entries, path, Box::new(system_clock))
    }

    /// Construct a cache with an injectable clock, for deterministic tests.
    #[must_use]
    pub fn with_clock(ttl_ms: u64, max_entries: usize, path: Option<PathBuf>, clock: Clock) -> Self {
        Self {
            ttl_ms: ttl_ms as i64,
            max_entries: max_entries.max(1),
            path,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn now(&self) -> i64 {
        (self.clock)()
    }

    fn is_expired(&self, entry: &CacheEntry<V>, now: i64) -> bool {
        entry.updated_at + self.ttl_ms <= now
    }

    /// Look up `key`. Deletes and reports a miss for an expired entry;
    /// bumps `accessed_at` on a hit.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.now();
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get_mut(key) {
            Some(entry) if self.is_expired(entry, now) => {
                entries.remove(key);
                None
            }
            Some(entry) => {
                entry.accessed_at = now;
                Some(entry.value.clone())
            }
            None => None,
        }
    }

    /// Insert or overwrite `key`, preserving the original `created_at` on
    /// overwrite, then prune expired entries, then evict by ascending
    /// `(accessed_at, updated_at, created_at)` until at capacity.
    pub fn set(&self, key: String, value: V) {
        let now = self.now();
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        let created_at = entries.get(&key).map_or(now, |e| e.created_at);
        entries.insert(
            key,
            CacheEntry {
                value,
                created_at,
                updated_at: now,
                accessed_at: now,
            },
        );
        self.prune_expired_locked(&mut entries, now);
        self.evict_overflow_locked(&mut entries);
    }

    /// Remove `key` unconditionally.
    pub fn delete(&self, key: &str) {
        self.entries.lock().expect("cache lock poisoned").remove(key);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().expect("cache lock poisoned").clear();
    }

    /// Current number of live entries (including not-yet-pruned expired ones).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    /// `true` iff the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prune_expired_locked(&self, entries: &mut HashMap<String, CacheEntry<V>>, now: i64) {
        entries.retain(|_, e| !self.is_expired(e, now));
    }

    fn evict_overflow_locked(&self, entries: &mut HashMap<String, CacheEntry<V>>) {
        if entries.len() <= self.max_entries {
            return;
        }
        let mut keys: Vec<(String, i64, i64, i64)> = entries
            .iter()
            .map(|(k, e)| (k.clone(), e.accessed_at, e.updated_at, e.created_at))
            .collect();
        keys.sort_by_key(|(_, a, u, c)| (*a, *u, *c));
        let overflow = entries.len() - self.max_entries;
        for (k, ..) in keys.into_iter().take(overflow) {
            entries.remove(&k);
        }
    }
}

impl<V: Clone + Serialize + DeserializeOwned> ResponseCache<V> {
    /// Load the cache file from disk. A missing file is not an error; a
    /// file with a different version or any malformed shape yields a
    /// silently empty cache (spec.md §3 "Cache file", §7 `CacheCorruption`).
    pub fn load(&self) {
        let Some(path) = &self.path else { return };
        let Ok(content) = std::fs::read_to_string(path) else {
            return;
        };
        let Ok(file) = serde_json::from_str::<CacheFile<V>>(&content) else {
            tracing::warn!(target: "mcp.cache", path = %path.display(), "cache file malformed, starting empty");
            return;
        };
        if file.version != CACHE_FILE_VERSION {
            tracing::warn!(target: "mcp.cache", path = %path.display(), version = file.version, "cache file version mismatch, starting empty");
            return;
        }
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        *entries = file.entries.into_iter().collect();
    }

    /// Persist the cache: prune expired and overflow entries, ensure the
    /// parent directory exists with mode 0700, then write atomically
    /// (`<path>.<pid>.tmp` → rename → chmod 0600).
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error on any filesystem failure. Callers
    /// treat persistence as fire-and-forget per spec.md §4.4 step 7: log
    /// and discard.
    pub fn save(&self) -> std::io::Result<()> {
        let Some(path) = &self.path else { return Ok(()) };
        let now = self.now();
        let snapshot: std::collections::BTreeMap<String, CacheEntry<V>> = {
            let mut entries = self.entries.lock().expect("cache lock poisoned");
            self.prune_expired_locked(&mut entries, now);
            self.evict_overflow_locked(&mut entries);
            entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };
        let file = CacheFile {
            version: CACHE_FILE_VERSION,
            entries: snapshot,
        };
        let json = serde_json::to_vec(&file).map_err(std::io::Error::other)?;
        write_atomically(path, &json)
    }
}

fn write_atomically(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
            set_mode(parent, 0o700)?;
        }
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(format!(".{}.tmp", std::process::id()));
    let tmp_path = PathBuf::from(tmp_name);
    std::fs::write(&tmp_path, contents)?;
    set_mode(&tmp_path, 0o600)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}
