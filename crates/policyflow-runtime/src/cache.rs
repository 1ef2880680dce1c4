//! Response cache for LLM verdicts.
//!
//! Entries are content-addressed by a SHA-256 fingerprint of the request and
//! persisted as one YAML file per key (`<key>.yaml` holding
//! `{timestamp, result}`), so they survive restarts and can be inspected by
//! hand. A bounded in-memory tier (moka) sits in front of the files.
//!
//! The memory tier never outlives its file: deleting `<key>.yaml` removes
//! the entry from both tiers.
//!
//! An entry is valid while `now - timestamp < ttl`. Expired, unreadable or
//! malformed entries read as absent and are deleted. A TTL of zero turns the
//! cache off entirely: nothing is read, written, or created on disk.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::sync::Cache;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};

const LOCK_STRIPES: usize = 16;
const ENTRY_EXTENSION: &str = "yaml";

/// SHA-256 fingerprint used as a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Fingerprint a single piece of text.
    pub fn for_text(input: &str) -> Self {
        Self(hex::encode(Sha256::digest(input.as_bytes())))
    }

    /// Fingerprint a system prompt and user prompt pair.
    ///
    /// Each part is length-prefixed, so `("ab", "c")` and `("a", "bc")`
    /// produce different keys.
    pub fn for_request(system_prompt: &str, prompt: &str) -> Self {
        let mut hasher = Sha256::new();
        for part in [system_prompt, prompt] {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part.as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lock stripe from the first digest byte.
    fn stripe(&self) -> usize {
        self.0
            .get(..2)
            .and_then(|byte| u8::from_str_radix(byte, 16).ok())
            .map_or(0, usize::from)
            % LOCK_STRIPES
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// On-disk and in-memory entry layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    timestamp: DateTime<Utc>,
    result: JsonValue,
}

impl StoredEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        // Timestamps from the future count as age zero
        let age = Utc::now()
            .signed_duration_since(self.timestamp)
            .to_std()
            .unwrap_or(Duration::ZERO);
        age < ttl
    }
}

/// Two-tier TTL cache: moka in front, YAML files behind.
pub struct ResponseCache {
    dir: PathBuf,
    ttl: Duration,
    memory: Option<Cache<CacheKey, StoredEntry>>,
    stripes: [Mutex<()>; LOCK_STRIPES],
}

impl ResponseCache {
    /// Create a cache rooted at `dir`. The directory is created only when
    /// `ttl` is non-zero.
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration, memory_capacity: u64) -> Self {
        let dir = dir.into();

        let memory = if ttl.is_zero() {
            None
        } else {
            if let Err(e) = fs::create_dir_all(&dir) {
                tracing::warn!(dir = %dir.display(), error = %e, "Failed to create cache directory");
            }
            Some(
                Cache::builder()
                    .max_capacity(memory_capacity)
                    .time_to_live(ttl)
                    .build(),
            )
        };

        Self {
            dir,
            ttl,
            memory,
            stripes: std::array::from_fn(|_| Mutex::new(())),
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self::new(PathBuf::new(), Duration::ZERO, 0)
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.{}", key, ENTRY_EXTENSION))
    }

    /// Return the cached payload for `key` if present and unexpired.
    pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        if !self.is_enabled() {
            return None;
        }

        let _guard = self.stripes[key.stripe()].lock();

        if let Some(memory) = &self.memory {
            if let Some(entry) = memory.get(key) {
                // The file is the source of truth; a deleted file evicts the entry
                if entry.is_fresh(self.ttl) && self.entry_path(key).exists() {
                    if let Ok(value) = serde_json::from_value(entry.result) {
                        return Some(value);
                    }
                }
                memory.invalidate(key);
            }
        }

        let entry = self.read_entry(key)?;
        let value = match serde_json::from_value::<T>(entry.result.clone()) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "Cached payload has unexpected shape, removing");
                self.remove_file(key);
                return None;
            }
        };

        if let Some(memory) = &self.memory {
            memory.insert(key.clone(), entry);
        }
        Some(value)
    }

    /// Read and check the file entry. Caller holds the key's stripe.
    fn read_entry(&self, key: &CacheKey) -> Option<StoredEntry> {
        let path = self.entry_path(key);

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "Unreadable cache entry, removing");
                self.remove_file(key);
                return None;
            }
        };

        let entry: StoredEntry = match serde_yaml::from_str(&contents) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "Corrupt cache entry, removing");
                self.remove_file(key);
                return None;
            }
        };

        if !entry.is_fresh(self.ttl) {
            tracing::debug!(key = %key, "Cache entry expired, removing");
            self.remove_file(key);
            return None;
        }

        Some(entry)
    }

    fn remove_file(&self, key: &CacheKey) {
        if let Err(e) = fs::remove_file(self.entry_path(key)) {
            if e.kind() != ErrorKind::NotFound {
                tracing::debug!(key = %key, error = %e, "Failed to remove cache entry");
            }
        }
    }

    /// Store `value` under `key` with the current timestamp.
    ///
    /// Storage failures are logged and swallowed.
    pub fn put<T: Serialize>(&self, key: &CacheKey, value: &T) {
        if !self.is_enabled() {
            return;
        }

        let result = match serde_json::to_value(value) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to serialize cache payload");
                return;
            }
        };
        let entry = StoredEntry {
            timestamp: Utc::now(),
            result,
        };

        let _guard = self.stripes[key.stripe()].lock();

        if let Err(e) = self.write_entry(key, &entry) {
            tracing::warn!(key = %key, error = %e, "Failed to write cache entry");
        }
        if let Some(memory) = &self.memory {
            memory.insert(key.clone(), entry);
        }
    }

    /// Write through a temporary file so readers never see a partial entry.
    fn write_entry(&self, key: &CacheKey, entry: &StoredEntry) -> std::io::Result<()> {
        let yaml = serde_yaml::to_string(entry)
            .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;

        let path = self.entry_path(key);
        let tmp = path.with_extension("yaml.tmp");
        fs::write(&tmp, yaml)?;
        fs::rename(&tmp, &path)
    }

    /// Remove every entry from both tiers.
    pub fn clear(&self) {
        if !self.is_enabled() {
            return;
        }

        let _guards: Vec<_> = self.stripes.iter().map(|s| s.lock()).collect();

        if let Some(memory) = &self.memory {
            memory.invalidate_all();
        }
        for path in self.entry_files() {
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove cache entry");
            }
        }
    }

    /// Number of entries on disk.
    pub fn len(&self) -> usize {
        self.entry_files().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry_files(&self) -> Vec<PathBuf> {
        if !self.is_enabled() {
            return Vec::new();
        }
        let Ok(read_dir) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        read_dir
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION))
            .collect()
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("dir", &self.dir)
            .field("ttl", &self.ttl)
            .field("memory_tier", &self.memory.is_some())
            .finish()
    }
}
