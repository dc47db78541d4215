//! Persisted dedup cache of discovered record keys.
//!
//! The cache is a "seen" set, not a "completed" set: a key is persisted
//! before its stub is handed to a detail worker, so a crash can only cost
//! a duplicate re-fetch, never a lost discovery. That gives the pipeline
//! at-least-once delivery to the detail stage.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

use crate::error::PersistenceError;

/// Durable set of already-discovered record keys.
///
/// Persisted as a JSON array of sorted keys. All mutation goes through an
/// internal mutex, so concurrent inserts from detail workers are
/// serialized and a key added by one worker is immediately visible to the
/// rest.
pub struct DedupCache {
    path: PathBuf,
    keys: Mutex<BTreeSet<String>>,
}

impl DedupCache {
    /// Load the cache from disk.
    ///
    /// A missing file starts an empty cache. A file that exists but does
    /// not parse is treated as lost state: warn and start fresh, since
    /// re-walking costs only duplicate work. A file that cannot be read
    /// at all is a persistence failure.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();

        let keys = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|source| PersistenceError::Io {
                path: path.clone(),
                source,
            })?;
            match serde_json::from_str::<BTreeSet<String>>(&raw) {
                Ok(keys) => {
                    info!(path = ?path, count = keys.len(), "Resumed dedup cache");
                    keys
                }
                Err(e) => {
                    warn!(path = ?path, error = %e, "Could not parse cache file; starting fresh");
                    BTreeSet::new()
                }
            }
        } else {
            info!(path = ?path, "No cache file found; starting fresh");
            BTreeSet::new()
        };

        Ok(Self {
            path,
            keys: Mutex::new(keys),
        })
    }

    /// Whether a key has already been discovered.
    pub fn contains(&self, key: &str) -> bool {
        self.keys.lock().unwrap().contains(key)
    }

    /// Number of discovered keys.
    pub fn len(&self) -> usize {
        self.keys.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.lock().unwrap().is_empty()
    }

    /// Snapshot of all keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().iter().cloned().collect()
    }

    /// Record a newly discovered key.
    ///
    /// Returns `false` without touching disk if the key is already
    /// present. For a new key the full set is persisted before this
    /// method returns, so the caller may dispatch the stub knowing the
    /// discovery survives a crash.
    pub fn insert(&self, key: impl Into<String>) -> Result<bool, PersistenceError> {
        let key = key.into();
        let mut keys = self.keys.lock().unwrap();
        if !keys.insert(key) {
            return Ok(false);
        }
        self.write_locked(&keys)?;
        Ok(true)
    }

    /// Rewrite the full set to durable storage.
    pub fn flush(&self) -> Result<(), PersistenceError> {
        let keys = self.keys.lock().unwrap();
        self.write_locked(&keys)
    }

    /// Write the set atomically: temp file in the same directory, then
    /// rename over the old file so a crash mid-write never corrupts it.
    fn write_locked(&self, keys: &BTreeSet<String>) -> Result<(), PersistenceError> {
        let json = serde_json::to_string(keys)?;

        let tmp = temp_sibling(&self.path);
        std::fs::write(&tmp, json).map_err(|source| PersistenceError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|source| PersistenceError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cache".to_string());
    name.push_str(".tmp");
    path.with_file_name(name)
}
