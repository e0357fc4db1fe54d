//! Persistent cache for API responses, output file fingerprints and refresh markers.
//!
//! This module provides a TTL-bounded key/value store persisted as JSON files.
//! It supports:
//!
//! - Deterministic namespaced keys (sorted request parameters are hashed)
//! - Expiry (`expires_at`) and staleness (`max_age`) checks
//! - Content fingerprints for files written to the output tree
//! - Scoped resets and fail-open loading of corrupt state

pub mod backend;
pub mod entry;
pub mod hash;
pub mod store;

pub use backend::{CacheBackend, CacheMetadata, CacheSnapshot, JsonFileBackend, MemoryBackend};
pub use entry::CacheEntry;
pub use hash::{CacheKey, Namespace};
pub use store::{CacheScope, CacheStats, CacheStore};
