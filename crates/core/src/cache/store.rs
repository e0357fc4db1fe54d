//! The cache store: TTL-bounded API responses, file fingerprints and refresh markers.
//!
//! Entries live in memory and are written back through a [`CacheBackend`] on
//! [`CacheStore::flush`]. A store whose persisted state cannot be read starts
//! empty rather than failing the run.

use super::backend::{CacheBackend, CacheMetadata, CacheSnapshot, MemoryBackend};
use super::entry::CacheEntry;
use super::hash::{CacheKey, Namespace, fingerprint, fingerprint_json};
use crate::{Clock, Error};
use chrono::Duration;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Which partitions a reset touches.
///
/// Refresh markers are cleared together with the API partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheScope {
    Api,
    Files,
    All,
}

impl std::str::FromStr for CacheScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "api" => Ok(CacheScope::Api),
            "files" | "file" => Ok(CacheScope::Files),
            "all" => Ok(CacheScope::All),
            other => Err(Error::InvalidInput(format!("unknown cache scope '{other}'"))),
        }
    }
}

/// Summary counts for `cache stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub api_entries: usize,
    pub api_expired: usize,
    pub api_older_than_1h: usize,
    pub api_older_than_24h: usize,
    pub markers: usize,
    pub file_entries: usize,
    pub files_missing: usize,
    pub disk_bytes: u64,
}

/// In-memory cache with pluggable persistence.
pub struct CacheStore {
    api: BTreeMap<String, CacheEntry>,
    files: BTreeMap<String, CacheEntry>,
    markers: BTreeMap<String, CacheEntry>,
    metadata: CacheMetadata,
    backend: Box<dyn CacheBackend>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("backend", &self.backend.describe())
            .field("api", &self.api.len())
            .field("files", &self.files.len())
            .field("markers", &self.markers.len())
            .finish()
    }
}

impl CacheStore {
    /// Load persisted state from `backend`.
    ///
    /// Unreadable state is logged, cleared, and replaced by an empty store.
    /// Entries that violate `expires_at >= created_at` are dropped on load.
    pub fn open(backend: Box<dyn CacheBackend>, clock: Arc<dyn Clock>) -> Self {
        let snapshot = match backend.load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(backend = %backend.describe(), error = %e, "Cache state unreadable, starting empty");
                if let Err(e) = backend.clear(CacheScope::All) {
                    tracing::warn!(error = %e, "Failed to clear corrupt cache state");
                }
                CacheSnapshot::default()
            }
        };

        let CacheSnapshot { mut api, mut files, mut markers, metadata } = snapshot;
        for map in [&mut api, &mut files, &mut markers] {
            map.retain(|_, entry| entry.is_consistent());
        }

        tracing::debug!(
            backend = %backend.describe(),
            api = api.len(),
            files = files.len(),
            markers = markers.len(),
            "Cache loaded"
        );

        Self { api, files, markers, metadata, backend, clock }
    }

    /// Store backed by process memory only.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::open(Box::new(MemoryBackend::new()), clock)
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn partition(&self, namespace: Namespace) -> &BTreeMap<String, CacheEntry> {
        match namespace {
            Namespace::Api => &self.api,
            Namespace::File => &self.files,
            Namespace::Marker => &self.markers,
        }
    }

    fn partition_mut(&mut self, namespace: Namespace) -> &mut BTreeMap<String, CacheEntry> {
        match namespace {
            Namespace::Api => &mut self.api,
            Namespace::File => &mut self.files,
            Namespace::Marker => &mut self.markers,
        }
    }

    /// True iff an entry exists, is not expired and is no older than `max_age`.
    ///
    /// Expired entries are evicted as a side effect.
    pub fn has(&mut self, key: &CacheKey, max_age: Duration) -> bool {
        let now = self.clock.now();
        let partition = self.partition_mut(key.namespace());

        let Some(entry) = partition.get(key.as_str()) else {
            return false;
        };

        if entry.is_expired(now) {
            partition.remove(key.as_str());
            return false;
        }

        !entry.is_stale(max_age, now)
    }

    /// Payload of a live entry. Updates `last_accessed`.
    pub fn get(&mut self, key: &CacheKey) -> Option<&Value> {
        let now = self.clock.now();
        let partition = self.partition_mut(key.namespace());

        if partition.get(key.as_str()).is_some_and(|entry| entry.is_expired(now)) {
            partition.remove(key.as_str());
            return None;
        }

        let entry = partition.get_mut(key.as_str())?;
        entry.touch(now);
        Some(entry.payload())
    }

    /// Read-only view of an entry without touching it.
    pub fn entry(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.partition(key.namespace()).get(key.as_str())
    }

    /// Insert or replace an entry created now.
    pub fn put(&mut self, key: &CacheKey, payload: Value, ttl: Option<Duration>) {
        let now = self.clock.now();
        let entry = CacheEntry::new(key.as_str().to_string(), fingerprint_json(&payload), payload, now, ttl);
        self.partition_mut(key.namespace()).insert(key.as_str().to_string(), entry);
    }

    pub fn remove(&mut self, key: &CacheKey) -> bool {
        self.partition_mut(key.namespace()).remove(key.as_str()).is_some()
    }

    /// Remove every entry past its expiry. Returns the number removed.
    pub fn evict_expired(&mut self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        for map in [&mut self.api, &mut self.files, &mut self.markers] {
            let before = map.len();
            map.retain(|_, entry| !entry.is_expired(now));
            removed += before - map.len();
        }

        self.metadata.last_cleanup = Some(now);
        if removed > 0 {
            tracing::info!(removed, "Evicted expired cache entries");
        }
        removed
    }

    /// Remove API entries and markers created more than `age` ago.
    pub fn evict_older_than(&mut self, age: Duration) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        for map in [&mut self.api, &mut self.markers] {
            let before = map.len();
            map.retain(|_, entry| !entry.is_stale(age, now));
            removed += before - map.len();
        }

        self.metadata.last_cleanup = Some(now);
        if removed > 0 {
            tracing::info!(removed, hours = age.num_hours(), "Evicted old cache entries");
        }
        removed
    }

    /// Drop file fingerprints whose file no longer exists.
    pub fn evict_missing_files(&mut self) -> usize {
        let before = self.files.len();
        self.files
            .retain(|key, _| key.strip_prefix("file:").is_some_and(|path| Path::new(path).exists()));
        let removed = before - self.files.len();
        if removed > 0 {
            tracing::info!(removed, "Dropped fingerprints of missing files");
        }
        removed
    }

    /// Record the fingerprint of a file that was just written.
    pub fn register_file(&mut self, path: &Path, metadata: Value) -> Result<(), Error> {
        let bytes = std::fs::read(path)?;
        let key = CacheKey::file(path);
        let now = self.clock.now();
        let payload = serde_json::json!({ "size": bytes.len(), "metadata": metadata });
        let entry = CacheEntry::new(key.as_str().to_string(), fingerprint(&bytes), payload, now, None);
        self.files.insert(key.as_str().to_string(), entry);
        Ok(())
    }

    /// Whether `path` was registered and still exists.
    ///
    /// With `check_content` the current bytes must also match the stored
    /// fingerprint. Fingerprints of vanished files are dropped.
    pub fn has_file(&mut self, path: &Path, check_content: bool) -> bool {
        let key = CacheKey::file(path);
        let Some(entry) = self.files.get(key.as_str()) else {
            return false;
        };

        if !path.exists() {
            self.files.remove(key.as_str());
            return false;
        }

        if !check_content {
            return true;
        }

        match std::fs::read(path) {
            Ok(bytes) => fingerprint(&bytes) == entry.fingerprint(),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Could not read cached file");
                false
            }
        }
    }

    /// Paths of every registered file.
    pub fn registered_files(&self) -> impl Iterator<Item = &str> {
        self.files.keys().filter_map(|key| key.strip_prefix("file:"))
    }

    /// Clear a scope both in memory and in the backend.
    pub fn reset(&mut self, scope: CacheScope) -> Result<(), Error> {
        match scope {
            CacheScope::Api => {
                self.api.clear();
                self.markers.clear();
            }
            CacheScope::Files => self.files.clear(),
            CacheScope::All => {
                self.api.clear();
                self.markers.clear();
                self.files.clear();
                self.metadata = CacheMetadata::default();
            }
        }
        self.backend.clear(scope)?;
        tracing::info!(?scope, "Cache reset");
        Ok(())
    }

    /// Persist the current state.
    pub fn flush(&mut self) -> Result<(), Error> {
        self.metadata.last_flush = Some(self.clock.now());
        let snapshot = CacheSnapshot {
            api: self.api.clone(),
            files: self.files.clone(),
            markers: self.markers.clone(),
            metadata: self.metadata.clone(),
        };
        self.backend.save(&snapshot)?;
        tracing::debug!(backend = %self.backend.describe(), "Cache flushed");
        Ok(())
    }

    pub fn metadata(&self) -> &CacheMetadata {
        &self.metadata
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let mut stats = CacheStats {
            api_entries: self.api.len(),
            markers: self.markers.len(),
            file_entries: self.files.len(),
            disk_bytes: self.backend.disk_usage(),
            ..CacheStats::default()
        };

        for entry in self.api.values() {
            if entry.is_expired(now) {
                stats.api_expired += 1;
            }
            if entry.is_stale(Duration::hours(1), now) {
                stats.api_older_than_1h += 1;
            }
            if entry.is_stale(Duration::hours(24), now) {
                stats.api_older_than_24h += 1;
            }
        }

        stats.files_missing = self.registered_files().filter(|path| !Path::new(path).exists()).count();
        stats
    }

    pub fn len(&self) -> usize {
        self.api.len() + self.files.len() + self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualClock;
    use crate::cache::backend::{API_CACHE_FILE, JsonFileBackend};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()))
    }

    #[test]
    fn test_put_then_has() {
        let clock = clock();
        let mut store = CacheStore::in_memory(clock.clone());
        let key = CacheKey::api("terms", &[]);

        store.put(&key, json!([{"num": 10}]), Some(Duration::hours(2)));
        assert!(store.has(&key, Duration::hours(2)));
        assert_eq!(store.get(&key), Some(&json!([{"num": 10}])));
    }

    #[test]
    fn test_has_respects_max_age() {
        let clock = clock();
        let mut store = CacheStore::in_memory(clock.clone());
        let key = CacheKey::api("terms", &[]);

        store.put(&key, json!(1), None);
        clock.advance(Duration::hours(3));
        assert!(!store.has(&key, Duration::hours(2)));
        assert!(store.has(&key, Duration::hours(4)));
    }

    #[test]
    fn test_expired_entry_evicted_on_has() {
        let clock = clock();
        let mut store = CacheStore::in_memory(clock.clone());
        let key = CacheKey::api("proceedings", &[("term", "10")]);

        store.put(&key, json!(1), Some(Duration::minutes(30)));
        clock.advance(Duration::hours(1));
        assert!(!store.has(&key, Duration::hours(24)));
        assert!(store.entry(&key).is_none());
    }

    #[test]
    fn test_put_is_idempotent() {
        let clock = clock();
        let mut store = CacheStore::in_memory(clock.clone());
        let key = CacheKey::api("terms", &[]);

        store.put(&key, json!({"a": 1}), None);
        let first = store.entry(&key).unwrap().created_at();
        clock.advance(Duration::minutes(10));
        store.put(&key, json!({"a": 1}), None);
        assert_eq!(store.len(), 1);
        assert_eq!(store.entry(&key).unwrap().created_at(), first + Duration::minutes(10));
        assert_eq!(store.entry(&key).unwrap().created_at(), clock.now());
    }

    #[test]
    fn test_get_updates_last_accessed() {
        let clock = clock();
        let mut store = CacheStore::in_memory(clock.clone());
        let key = CacheKey::api("terms", &[]);
        store.put(&key, json!(1), None);

        clock.advance(Duration::minutes(5));
        store.get(&key);
        let entry = store.entry(&key).unwrap();
        assert_eq!(entry.last_accessed() - entry.created_at(), Duration::minutes(5));
    }

    #[test]
    fn test_evict_expired() {
        let clock = clock();
        let mut store = CacheStore::in_memory(clock.clone());
        store.put(&CacheKey::api("a", &[]), json!(1), Some(Duration::hours(1)));
        store.put(&CacheKey::api("b", &[]), json!(2), Some(Duration::hours(5)));
        store.put(&CacheKey::marker("ongoing", 10, 1), json!(null), Some(Duration::hours(2)));

        clock.advance(Duration::hours(3));
        assert_eq!(store.evict_expired(), 2);
        assert!(store.entry(&CacheKey::api("b", &[])).is_some());
        assert!(store.metadata().last_cleanup.is_some());
    }

    #[test]
    fn test_evict_older_than() {
        let clock = clock();
        let mut store = CacheStore::in_memory(clock.clone());
        store.put(&CacheKey::api("old", &[]), json!(1), None);
        clock.advance(Duration::hours(30));
        store.put(&CacheKey::api("new", &[]), json!(2), None);

        assert_eq!(store.evict_older_than(Duration::hours(24)), 1);
        assert!(store.entry(&CacheKey::api("new", &[])).is_some());
    }

    #[test]
    fn test_reset_api_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("out.json");
        std::fs::write(&file, b"{}").unwrap();

        let mut store = CacheStore::in_memory(clock());
        store.put(&CacheKey::api("terms", &[]), json!(1), None);
        store.put(&CacheKey::marker("future", 10, 3), json!(null), None);
        store.register_file(&file, json!({})).unwrap();

        store.reset(CacheScope::Api).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.has_file(&file, true));

        store.reset(CacheScope::All).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_has_file_detects_changes_and_deletion() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("transkrypty_2024-01-10.json");
        std::fs::write(&file, b"original").unwrap();

        let mut store = CacheStore::in_memory(clock());
        store.register_file(&file, json!({"date": "2024-01-10"})).unwrap();
        assert!(store.has_file(&file, true));

        std::fs::write(&file, b"changed").unwrap();
        assert!(store.has_file(&file, false));
        assert!(!store.has_file(&file, true));

        std::fs::remove_file(&file).unwrap();
        assert!(!store.has_file(&file, false));
        assert_eq!(store.stats().file_entries, 0);
    }

    #[test]
    fn test_evict_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("kept.json");
        let gone = dir.path().join("gone.json");
        std::fs::write(&kept, b"1").unwrap();
        std::fs::write(&gone, b"2").unwrap();

        let mut store = CacheStore::in_memory(clock());
        store.register_file(&kept, json!({})).unwrap();
        store.register_file(&gone, json!({})).unwrap();
        std::fs::remove_file(&gone).unwrap();

        assert_eq!(store.stats().files_missing, 1);
        assert_eq!(store.evict_missing_files(), 1);
        assert_eq!(store.registered_files().count(), 1);
    }

    #[test]
    fn test_flush_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let clock = clock();
        let key = CacheKey::api("proceedings", &[("term", "10")]);

        let mut store = CacheStore::open(Box::new(JsonFileBackend::new(dir.path())), clock.clone());
        store.put(&key, json!([{"number": 1}]), Some(Duration::hours(6)));
        store.flush().unwrap();
        let original = store.entry(&key).unwrap().clone();

        let mut reopened = CacheStore::open(Box::new(JsonFileBackend::new(dir.path())), clock.clone());
        let loaded = reopened.entry(&key).unwrap();
        assert_eq!(loaded.key(), original.key());
        assert_eq!(loaded.fingerprint(), original.fingerprint());
        assert_eq!(loaded.created_at(), original.created_at());
        assert_eq!(loaded.expires_at(), original.expires_at());
        assert!(reopened.has(&key, Duration::hours(6)));
        assert!(reopened.metadata().last_flush.is_some());
    }

    #[test]
    fn test_corrupt_state_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(API_CACHE_FILE), "][").unwrap();

        let mut store = CacheStore::open(Box::new(JsonFileBackend::new(dir.path())), clock());
        assert!(store.is_empty());
        assert!(!dir.path().join(API_CACHE_FILE).exists());

        store.put(&CacheKey::api("terms", &[]), json!(1), None);
        store.flush().unwrap();
        assert!(dir.path().join(API_CACHE_FILE).exists());
    }

    #[test]
    fn test_inconsistent_entries_dropped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let raw = json!({
            "api:terms": {
                "key": "api:terms",
                "data_hash": "x",
                "created_at": "2024-06-01T12:00:00Z",
                "last_accessed": "2024-06-01T12:00:00Z",
                "expires_at": "2024-06-01T11:00:00Z",
                "payload": 1
            }
        });
        std::fs::write(dir.path().join(API_CACHE_FILE), raw.to_string()).unwrap();

        let store = CacheStore::open(Box::new(JsonFileBackend::new(dir.path())), clock());
        assert!(store.is_empty());
    }

    #[test]
    fn test_scope_from_str() {
        assert_eq!("api".parse::<CacheScope>().unwrap(), CacheScope::Api);
        assert_eq!("FILES".parse::<CacheScope>().unwrap(), CacheScope::Files);
        assert!("bogus".parse::<CacheScope>().is_err());
    }
}
