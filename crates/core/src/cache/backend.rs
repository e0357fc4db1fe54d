//! Persistence backends for the cache store.
//!
//! The on-disk layout is one JSON document per partition inside the cache
//! directory, each mapping key to entry:
//!
//! - `api_cache.json`
//! - `file_cache.json`
//! - `refresh_markers.json`
//! - `cache_metadata.json`

use super::entry::CacheEntry;
use super::store::CacheScope;
use crate::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const API_CACHE_FILE: &str = "api_cache.json";
pub const FILE_CACHE_FILE: &str = "file_cache.json";
pub const MARKERS_FILE: &str = "refresh_markers.json";
pub const METADATA_FILE: &str = "cache_metadata.json";

/// Current layout version written into `cache_metadata.json`.
pub const LAYOUT_VERSION: u32 = 1;

/// Bookkeeping stored next to the partitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub version: u32,
    #[serde(default)]
    pub last_flush: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_cleanup: Option<DateTime<Utc>>,
}

impl Default for CacheMetadata {
    fn default() -> Self {
        Self { version: LAYOUT_VERSION, last_flush: None, last_cleanup: None }
    }
}

/// Everything a backend persists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub api: BTreeMap<String, CacheEntry>,
    pub files: BTreeMap<String, CacheEntry>,
    pub markers: BTreeMap<String, CacheEntry>,
    pub metadata: CacheMetadata,
}

/// Storage for cache snapshots.
pub trait CacheBackend: Send {
    /// Read the full persisted state. Missing storage yields an empty snapshot.
    fn load(&self) -> Result<CacheSnapshot, Error>;

    /// Replace the persisted state.
    fn save(&self, snapshot: &CacheSnapshot) -> Result<(), Error>;

    /// Drop persisted state for a scope.
    fn clear(&self, scope: CacheScope) -> Result<(), Error>;

    /// Human readable location for logs.
    fn describe(&self) -> String;

    /// Bytes used on disk, if meaningful.
    fn disk_usage(&self) -> u64 {
        0
    }
}

impl<B: CacheBackend + Sync> CacheBackend for Arc<B> {
    fn load(&self) -> Result<CacheSnapshot, Error> {
        (**self).load()
    }

    fn save(&self, snapshot: &CacheSnapshot) -> Result<(), Error> {
        (**self).save(snapshot)
    }

    fn clear(&self, scope: CacheScope) -> Result<(), Error> {
        (**self).clear(scope)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }

    fn disk_usage(&self) -> u64 {
        (**self).disk_usage()
    }
}

/// JSON files inside a cache directory.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    dir: PathBuf,
}

impl JsonFileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn read_json<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T, Error> {
        let path = self.path(name);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&raw).map_err(|e| Error::CacheCorrupt(format!("{}: {e}", path.display())))
    }

    /// Write through a temp file and rename.
    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<(), Error> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(name);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), Error> {
        match fs::remove_file(self.path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl CacheBackend for JsonFileBackend {
    fn load(&self) -> Result<CacheSnapshot, Error> {
        Ok(CacheSnapshot {
            api: self.read_json(API_CACHE_FILE)?,
            files: self.read_json(FILE_CACHE_FILE)?,
            markers: self.read_json(MARKERS_FILE)?,
            metadata: self.read_json(METADATA_FILE)?,
        })
    }

    fn save(&self, snapshot: &CacheSnapshot) -> Result<(), Error> {
        self.write_json(API_CACHE_FILE, &snapshot.api)?;
        self.write_json(FILE_CACHE_FILE, &snapshot.files)?;
        self.write_json(MARKERS_FILE, &snapshot.markers)?;
        self.write_json(METADATA_FILE, &snapshot.metadata)?;
        Ok(())
    }

    fn clear(&self, scope: CacheScope) -> Result<(), Error> {
        match scope {
            CacheScope::Api => {
                self.remove(API_CACHE_FILE)?;
                self.remove(MARKERS_FILE)?;
            }
            CacheScope::Files => self.remove(FILE_CACHE_FILE)?,
            CacheScope::All => {
                for name in [API_CACHE_FILE, FILE_CACHE_FILE, MARKERS_FILE, METADATA_FILE] {
                    self.remove(name)?;
                }
            }
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }

    fn disk_usage(&self) -> u64 {
        [API_CACHE_FILE, FILE_CACHE_FILE, MARKERS_FILE, METADATA_FILE]
            .iter()
            .filter_map(|name| fs::metadata(self.path(name)).ok())
            .map(|meta| meta.len())
            .sum()
    }
}

/// Process-local backend for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    snapshot: Mutex<CacheSnapshot>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheSnapshot> {
        self.snapshot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CacheBackend for MemoryBackend {
    fn load(&self) -> Result<CacheSnapshot, Error> {
        Ok(self.lock().clone())
    }

    fn save(&self, snapshot: &CacheSnapshot) -> Result<(), Error> {
        *self.lock() = snapshot.clone();
        Ok(())
    }

    fn clear(&self, scope: CacheScope) -> Result<(), Error> {
        let mut snapshot = self.lock();
        match scope {
            CacheScope::Api => {
                snapshot.api.clear();
                snapshot.markers.clear();
            }
            CacheScope::Files => snapshot.files.clear(),
            CacheScope::All => *snapshot = CacheSnapshot::default(),
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
