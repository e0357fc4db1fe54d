//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SEJMBOT_*, `__` separates nested keys)
//! 2. TOML config file (if SEJMBOT_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Retry and backoff settings for API calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts per request, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt; doubled on each further attempt.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound for a single backoff delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Pause after an HTTP 429 before trying again.
    #[serde(default = "default_rate_limit_cooldown_ms")]
    pub rate_limit_cooldown_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            rate_limit_cooldown_ms: default_rate_limit_cooldown_ms(),
        }
    }
}

/// Settings for the continuous scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSettings {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,

    /// Proceedings whose dates are older than this are no longer polled.
    #[serde(default = "default_max_proceeding_age_days")]
    pub max_proceeding_age_days: i64,

    #[serde(default)]
    pub notifications_enabled: bool,

    /// Webhook receiving a JSON summary after downloads.
    #[serde(default)]
    pub notification_webhook: Option<String>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            max_proceeding_age_days: default_max_proceeding_age_days(),
            notifications_enabled: false,
            notification_webhook: None,
        }
    }
}

impl SchedulerSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SEJMBOT_*)
/// 2. TOML config file (if SEJMBOT_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the Sejm REST API.
    ///
    /// Set via SEJMBOT_API_BASE_URL environment variable.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Parliamentary term used when the CLI does not name one.
    #[serde(default = "default_term")]
    pub default_term: u32,

    /// Root of the output tree.
    ///
    /// Set via SEJMBOT_OUTPUT_DIR environment variable.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Cache directory; defaults to `<output_dir>/cache`.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Scheduler state file.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Politeness delay between consecutive requests.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Maximum bytes accepted per response body.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// TTL for cached metadata responses (term info, proceeding lists, members).
    #[serde(default = "default_api_cache_ttl_hours")]
    pub api_cache_ttl_hours: i64,

    /// Retention for API entries during `cache clean`.
    #[serde(default = "default_cache_retention_days")]
    pub cache_retention_days: i64,

    /// Download the HTML text of every statement.
    #[serde(default = "default_true")]
    pub fetch_full_statements: bool,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub scheduler: SchedulerSettings,
}

fn default_api_base_url() -> String {
    "https://api.sejm.gov.pl".into()
}

fn default_term() -> u32 {
    10
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data_sejm")
}

fn default_state_file() -> PathBuf {
    PathBuf::from("scheduler_state.json")
}

fn default_user_agent() -> String {
    concat!("SejmBot/", env!("CARGO_PKG_VERSION")).into()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_request_delay_ms() -> u64 {
    1_000
}

fn default_max_bytes() -> usize {
    50 * 1024 * 1024
}

fn default_api_cache_ttl_hours() -> i64 {
    1
}

fn default_cache_retention_days() -> i64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    5_000
}

fn default_max_delay_ms() -> u64 {
    20_000
}

fn default_rate_limit_cooldown_ms() -> u64 {
    10_000
}

fn default_interval_minutes() -> u64 {
    30
}

fn default_max_proceeding_age_days() -> i64 {
    7
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            default_term: default_term(),
            output_dir: default_output_dir(),
            cache_dir: None,
            state_file: default_state_file(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            request_delay_ms: default_request_delay_ms(),
            max_bytes: default_max_bytes(),
            api_cache_ttl_hours: default_api_cache_ttl_hours(),
            cache_retention_days: default_cache_retention_days(),
            fetch_full_statements: true,
            retry: RetrySettings::default(),
            scheduler: SchedulerSettings::default(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// Effective cache directory.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| self.output_dir.join("cache"))
    }

    pub fn api_cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.api_cache_ttl_hours)
    }

    pub fn cache_retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.cache_retention_days)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SEJMBOT_`
    /// 2. TOML file from `SEJMBOT_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Like [`AppConfig::load`], with an explicit TOML file taking the place of
    /// `SEJMBOT_CONFIG_FILE`.
    pub fn load_from(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        match file {
            Some(path) => figment = figment.merge(Toml::file(path)),
            None => {
                if let Ok(config_path) = std::env::var("SEJMBOT_CONFIG_FILE") {
                    figment = figment.merge(Toml::file(&config_path));
                }
            }
        }

        figment = figment.merge(
            Env::prefixed("SEJMBOT_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Webhook URL when notifications are switched on.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if notifications are enabled without a webhook.
    pub fn notification_webhook(&self) -> Result<Option<&str>, ConfigError> {
        if !self.scheduler.notifications_enabled {
            return Ok(None);
        }
        self.scheduler.notification_webhook.as_deref().map(Some).ok_or_else(|| ConfigError::Missing {
            field: "scheduler.notification_webhook".into(),
            hint: "Set SEJMBOT_SCHEDULER__NOTIFICATION_WEBHOOK environment variable".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.api_base_url, "https://api.sejm.gov.pl");
        assert_eq!(config.default_term, 10);
        assert_eq!(config.output_dir, PathBuf::from("data_sejm"));
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.request_delay_ms, 1_000);
        assert_eq!(config.max_bytes, 50 * 1024 * 1024);
        assert!(config.fetch_full_statements);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_ms, 5_000);
        assert_eq!(config.retry.max_delay_ms, 20_000);
        assert_eq!(config.scheduler.interval_minutes, 30);
        assert_eq!(config.scheduler.max_proceeding_age_days, 7);
        assert!(config.user_agent.starts_with("SejmBot/"));
    }

    #[test]
    fn test_cache_dir_defaults_under_output() {
        let config = AppConfig::default();
        assert_eq!(config.cache_dir(), PathBuf::from("data_sejm").join("cache"));

        let config = AppConfig { cache_dir: Some(PathBuf::from("/tmp/c")), ..Default::default() };
        assert_eq!(config.cache_dir(), PathBuf::from("/tmp/c"));
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(30_000));
        assert_eq!(config.request_delay(), Duration::from_secs(1));
        assert_eq!(config.api_cache_ttl(), chrono::Duration::hours(1));
        assert_eq!(config.cache_retention(), chrono::Duration::days(30));
        assert_eq!(config.scheduler.interval(), Duration::from_secs(1800));
    }

    #[test]
    fn test_notification_webhook() {
        let config = AppConfig::default();
        assert_eq!(config.notification_webhook().unwrap(), None);

        let mut config = AppConfig::default();
        config.scheduler.notifications_enabled = true;
        assert!(matches!(config.notification_webhook(), Err(ConfigError::Missing { .. })));

        config.scheduler.notification_webhook = Some("http://hook.local".into());
        assert_eq!(config.notification_webhook().unwrap(), Some("http://hook.local"));
    }

    #[test]
    fn test_toml_layer() {
        let toml = r#"
            default_term = 9
            output_dir = "out"

            [retry]
            max_attempts = 5

            [scheduler]
            interval_minutes = 10
        "#;
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::string(toml))
            .extract()
            .unwrap();
        assert_eq!(config.default_term, 9);
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 5_000);
        assert_eq!(config.scheduler.interval_minutes, 10);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sejmbot.toml");
        std::fs::write(&path, "default_term = 9\nrequest_delay_ms = 250\n").unwrap();

        let config = AppConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.default_term, 9);
        assert_eq!(config.request_delay(), Duration::from_millis(250));
    }
}
