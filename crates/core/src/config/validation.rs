//! Configuration validation rules.
//!
//! Checks run on `AppConfig` after it has been loaded from environment,
//! files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `api_base_url` is not an http(s) URL
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_bytes` is 0
    /// - `user_agent` is empty
    /// - retry or scheduler values are out of range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://")) {
            return Err(invalid("api_base_url", "must start with http:// or https://"));
        }

        if self.default_term == 0 {
            return Err(invalid("default_term", "must be greater than 0"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.api_cache_ttl_hours < 0 {
            return Err(invalid("api_cache_ttl_hours", "must not be negative"));
        }
        if self.cache_retention_days <= 0 {
            return Err(invalid("cache_retention_days", "must be greater than 0"));
        }

        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "must be at least 1"));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(invalid("retry.base_delay_ms", "must not exceed retry.max_delay_ms"));
        }

        if self.scheduler.interval_minutes == 0 {
            return Err(invalid("scheduler.interval_minutes", "must be greater than 0"));
        }
        if self.scheduler.max_proceeding_age_days < 0 {
            return Err(invalid("scheduler.max_proceeding_age_days", "must not be negative"));
        }

        if self.request_delay_ms == 0 {
            tracing::warn!("request_delay_ms is 0; requests to the API will not be spaced out");
        }

        Ok(())
    }
}
