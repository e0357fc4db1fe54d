//! Cache entries.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single cached record.
///
/// Only [`CacheStore`](super::CacheStore) creates or mutates entries; everything
/// else sees them read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    key: String,
    #[serde(rename = "data_hash")]
    fingerprint: String,
    created_at: DateTime<Utc>,
    last_accessed: DateTime<Utc>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    payload: Value,
}

impl CacheEntry {
    /// Build an entry created at `now`.
    ///
    /// Negative TTLs are clamped to zero so `expires_at >= created_at` always holds.
    pub(crate) fn new(
        key: String, fingerprint: String, payload: Value, now: DateTime<Utc>, ttl: Option<Duration>,
    ) -> Self {
        let expires_at = ttl.map(|ttl| now + ttl.max(Duration::zero()));
        Self { key, fingerprint, created_at: now, last_accessed: now, expires_at, payload }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_accessed(&self) -> DateTime<Utc> {
        self.last_accessed
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Past its explicit expiry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires < now)
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }

    /// Older than `max_age`, regardless of `expires_at`.
    pub fn is_stale(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) > max_age
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.last_accessed = now;
    }

    /// Entries read from disk may violate the expiry invariant if edited by hand.
    pub(crate) fn is_consistent(&self) -> bool {
        self.expires_at.is_none_or(|expires| expires >= self.created_at)
    }
}
