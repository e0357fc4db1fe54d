//! Cache key generation and content fingerprints.
//!
//! Keys are namespaced so that API responses, file fingerprints and refresh
//! markers can never collide.

use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// Partition of the cache a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Cached upstream API responses.
    Api,
    /// Fingerprints of files written to the output tree.
    File,
    /// "Last checked at" markers used for refresh throttling.
    Marker,
}

/// A namespaced cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: Namespace,
    key: String,
}

impl CacheKey {
    /// Key for an API call.
    ///
    /// Parameters are sorted before hashing, so the same logical request always maps
    /// to the same key regardless of parameter order.
    pub fn api(endpoint: &str, params: &[(&str, &str)]) -> Self {
        if params.is_empty() {
            return Self { namespace: Namespace::Api, key: format!("api:{endpoint}") };
        }

        let mut sorted: Vec<_> = params.iter().collect();
        sorted.sort();

        let mut hasher = Sha256::new();
        for (k, v) in sorted {
            hasher.update(k.as_bytes());
            hasher.update(b"=");
            hasher.update(v.as_bytes());
            hasher.update(b"&");
        }

        Self { namespace: Namespace::Api, key: format!("api:{endpoint}:{}", hex::encode(hasher.finalize())) }
    }

    /// Key for a file in the output tree.
    pub fn file(path: &Path) -> Self {
        let posix = path.to_string_lossy().replace('\\', "/");
        Self { namespace: Namespace::File, key: format!("file:{posix}") }
    }

    /// Refresh marker for a proceeding, `<status>_check:<term>:<proceeding>`.
    pub fn marker(status: &str, term: u32, proceeding_id: u32) -> Self {
        Self { namespace: Namespace::Marker, key: format!("{status}_check:{term}:{proceeding_id}") }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Path of a file key, without the `file:` prefix.
    pub fn file_path(&self) -> Option<&str> {
        match self.namespace {
            Namespace::File => self.key.strip_prefix("file:"),
            _ => None,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// SHA-256 hex digest of raw bytes.
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Fingerprint of a JSON payload.
///
/// `serde_json::Value` objects keep their keys sorted, so equal payloads hash equally.
pub fn fingerprint_json(value: &serde_json::Value) -> String {
    fingerprint(value.to_string().as_bytes())
}
