//! Core types and shared functionality for sejmbot.
//!
//! This crate provides:
//! - Cache store with JSON file persistence and TTL staleness
//! - Refresh policy for proceedings (future/ongoing/completed)
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod refresh;

pub use cache::{CacheEntry, CacheKey, CacheScope, CacheStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AppConfig;
pub use error::Error;
pub use refresh::{ProceedingStatus, RefreshDecision, RefreshPolicy, RefreshRequest};
