//! Retry and backoff decisions for API calls.

use sejmbot_core::Error;
use sejmbot_core::config::RetrySettings;
use std::time::Duration;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Back off, then try again.
    Retry(Duration),
    /// Upstream rate limit: pause for the cooldown, then try again.
    Cooldown(Duration),
    /// Stop and surface the error.
    GiveUp,
}

/// Exponential backoff bounded by `max_attempts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub rate_limit_cooldown: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            rate_limit_cooldown: Duration::from_millis(settings.rate_limit_cooldown_ms),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given (1-based) failed attempt: `base * 2^(attempt-1)`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exp).min(self.max_delay)
    }

    /// Decide what happens after `attempt` failed with `error`.
    pub fn decide(&self, attempt: u32, error: &Error) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }

        match error {
            Error::Timeout(_) | Error::ConnectionFailed(_) => RetryDecision::Retry(self.backoff(attempt)),
            Error::HttpStatus { status, .. } if (500..=599).contains(status) => {
                RetryDecision::Retry(self.backoff(attempt))
            }
            Error::RateLimited(_) => RetryDecision::Cooldown(self.rate_limit_cooldown),
            Error::HttpStatus { .. }
            | Error::InvalidInput(_)
            | Error::ExtractFailed(_)
            | Error::Parse(_)
            | Error::InvalidDate(_)
            | Error::CacheCorrupt(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::Unknown(_) => RetryDecision::GiveUp,
        }
    }
}
