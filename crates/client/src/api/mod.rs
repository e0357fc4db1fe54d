//! Sejm REST API client.
//!
//! ### Transport
//! - One request in flight at a time, spaced by a politeness delay (default 1s).
//! - Exponential backoff for timeouts, connection errors and 5xx (see [`RetryPolicy`]).
//! - HTTP 429 pauses for a cooldown and retries against the same attempt budget.
//!
//! ### Responses
//! - 403 and 404 are not errors: they surface as [`ApiResponse::Absent`].
//! - JSON endpoints are decoded; HTML and binary endpoints keep raw bytes.

pub mod endpoints;
pub mod mock;
pub mod models;
pub mod retry;

pub use endpoints::{Endpoint, ResponseKind};
pub use mock::MockSejmApi;
pub use models::{Club, Member, Proceeding, StatementList, StatementRecord, Term};
pub use retry::{RetryDecision, RetryPolicy};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, header};
use sejmbot_core::{AppConfig, Error};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Body of a successful API call.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Json(Value),
    Bytes { bytes: Bytes, content_type: Option<String> },
    /// The resource does not exist (yet) or is not public.
    Absent,
}

impl ApiResponse {
    pub fn is_absent(&self) -> bool {
        matches!(self, ApiResponse::Absent)
    }

    /// Decode into a typed value. `Absent` yields `None`.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<Option<T>, Error> {
        match self {
            ApiResponse::Json(value) => serde_json::from_value(value).map(Some).map_err(|e| Error::Parse(e.to_string())),
            ApiResponse::Bytes { bytes, .. } => {
                serde_json::from_slice(&bytes).map(Some).map_err(|e| Error::Parse(e.to_string()))
            }
            ApiResponse::Absent => Ok(None),
        }
    }

    /// Raw body and declared content type. JSON bodies are re-serialized.
    pub fn into_bytes(self) -> Option<(Bytes, Option<String>)> {
        match self {
            ApiResponse::Bytes { bytes, content_type } => Some((bytes, content_type)),
            ApiResponse::Json(value) => Some((Bytes::from(value.to_string()), Some("application/json".into()))),
            ApiResponse::Absent => None,
        }
    }
}

/// Access to the Sejm API.
#[async_trait]
pub trait SejmApi: Send + Sync {
    /// Perform one logical call, including retries.
    async fn fetch(&self, endpoint: &Endpoint) -> Result<ApiResponse, Error>;
}

/// Configuration for [`SejmClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    /// Minimum spacing between consecutive requests.
    pub request_delay: Duration,
    pub max_bytes: usize,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ClientConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.api_base_url.clone(),
            user_agent: config.user_agent.clone(),
            timeout: config.timeout(),
            request_delay: config.request_delay(),
            max_bytes: config.max_bytes,
            retry: RetryPolicy::from(&config.retry),
        }
    }
}

/// Rate limiter to enforce request intervals.
#[derive(Debug)]
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self { last_request: Mutex::new(None), min_interval }
    }

    /// Wait until `min_interval` has passed since the previous request.
    async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// HTTP client for the Sejm API.
#[derive(Debug, Clone)]
pub struct SejmClient {
    http: Client,
    config: ClientConfig,
    rate_limiter: Arc<RateLimiter>,
}

impl SejmClient {
    /// Create a new client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::ConnectionFailed(format!("failed to build HTTP client: {e}")))?;

        let rate_limiter = Arc::new(RateLimiter::new(config.request_delay));
        Ok(Self { http, config, rate_limiter })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn send_once(&self, endpoint: &Endpoint) -> Result<ApiResponse, Error> {
        let url = endpoint.url(&self.config.base_url)?;
        let start = Instant::now();

        let response = self
            .http
            .get(url.clone())
            .header(header::ACCEPT, endpoint.accept())
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN || status == StatusCode::NOT_FOUND {
            tracing::debug!(%url, status = status.as_u16(), "Resource not available");
            return Ok(ApiResponse::Absent);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited(url.to_string()));
        }
        if !status.is_success() {
            return Err(Error::HttpStatus { status: status.as_u16(), url: url.to_string() });
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::InvalidInput(format!("{len} bytes exceeds {}", self.config.max_bytes)));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response.bytes().await.map_err(classify_transport_error)?;
        if bytes.len() > self.config.max_bytes {
            return Err(Error::InvalidInput(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        tracing::debug!(%url, bytes = bytes.len(), elapsed_ms = start.elapsed().as_millis() as u64, "Fetched");

        let is_json = endpoint.kind == ResponseKind::Json
            || content_type.as_deref().is_some_and(|ct| ct.contains("application/json"));
        if is_json {
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Ok(ApiResponse::Absent);
            }
            let value = serde_json::from_slice(&bytes).map_err(|e| Error::Parse(format!("{url}: {e}")))?;
            return Ok(ApiResponse::Json(value));
        }

        Ok(ApiResponse::Bytes { bytes, content_type })
    }
}

fn classify_transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else if e.is_connect() || e.is_request() || e.is_body() {
        Error::ConnectionFailed(e.to_string())
    } else if e.is_decode() {
        Error::Parse(e.to_string())
    } else {
        Error::Unknown(e.to_string())
    }
}

#[async_trait]
impl SejmApi for SejmClient {
    async fn fetch(&self, endpoint: &Endpoint) -> Result<ApiResponse, Error> {
        let mut attempt = 1;
        loop {
            self.rate_limiter.acquire().await;

            let error = match self.send_once(endpoint).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            match self.config.retry.decide(attempt, &error) {
                RetryDecision::Retry(delay) => {
                    tracing::warn!(
                        path = %endpoint.path,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying request"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::Cooldown(delay) => {
                    tracing::warn!(
                        path = %endpoint.path,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited, cooling down"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => {
                    tracing::error!(path = %endpoint.path, attempt, error = %error, "Request failed");
                    return Err(error);
                }
            }
            attempt += 1;
        }
    }
}
