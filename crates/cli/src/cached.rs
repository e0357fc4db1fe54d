//! API calls backed by the response cache.

use chrono::Duration;
use sejmbot_client::{ApiResponse, Endpoint, SejmApi};
use sejmbot_core::{CacheStore, Error};

/// Serves JSON metadata endpoints from the cache while fresh.
///
/// Only JSON bodies are cached; binary and HTML responses always hit the API.
pub struct CachedApi<'a> {
    api: &'a dyn SejmApi,
    ttl: Duration,
    bypass: bool,
}

impl<'a> CachedApi<'a> {
    pub fn new(api: &'a dyn SejmApi, ttl: Duration) -> Self {
        Self { api, ttl, bypass: false }
    }

    /// Skip cache reads. Fresh responses are still stored.
    pub fn bypassing(mut self, bypass: bool) -> Self {
        self.bypass = bypass;
        self
    }

    pub async fn fetch(&self, store: &mut CacheStore, endpoint: &Endpoint) -> Result<ApiResponse, Error> {
        let key = endpoint.cache_key();

        if !self.bypass
            && store.has(&key, self.ttl)
            && let Some(value) = store.get(&key)
        {
            tracing::debug!(key = %key, "Cache hit");
            return Ok(ApiResponse::Json(value.clone()));
        }

        self.refresh(store, endpoint).await
    }

    /// Ask the API and store a JSON answer.
    pub async fn refresh(&self, store: &mut CacheStore, endpoint: &Endpoint) -> Result<ApiResponse, Error> {
        let response = self.api.fetch(endpoint).await?;
        if let ApiResponse::Json(value) = &response {
            store.put(&endpoint.cache_key(), value.clone(), Some(self.ttl));
        }
        Ok(response)
    }

    /// Always ask the API.
    pub async fn fetch_fresh(&self, endpoint: &Endpoint) -> Result<ApiResponse, Error> {
        self.api.fetch(endpoint).await
    }
}
