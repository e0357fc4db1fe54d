//! In-memory Sejm API for tests.
//!
//! Responses are registered per endpoint path; unknown paths answer
//! [`ApiResponse::Absent`], like the real API's 404.

use super::{ApiResponse, Endpoint, SejmApi};
use async_trait::async_trait;
use bytes::Bytes;
use sejmbot_core::Error;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

enum Canned {
    Response(ApiResponse),
    Failure(fn() -> Error),
}

/// Mock API client.
///
/// # Example
/// ```ignore
/// let api = MockSejmApi::new().with_json("/sejm/term10/proceedings", json!([]));
/// let response = api.fetch(&Endpoint::proceedings(10)).await?;
/// ```
#[derive(Default)]
pub struct MockSejmApi {
    responses: Mutex<HashMap<String, Canned>>,
    calls: Mutex<Vec<String>>,
}

impl MockSejmApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(self, path: &str, canned: Canned) -> Self {
        self.responses.lock().unwrap_or_else(|p| p.into_inner()).insert(path.to_string(), canned);
        self
    }

    pub fn with_json(self, path: &str, value: Value) -> Self {
        self.insert(path, Canned::Response(ApiResponse::Json(value)))
    }

    pub fn with_bytes(self, path: &str, bytes: impl Into<Bytes>, content_type: &str) -> Self {
        let response = ApiResponse::Bytes { bytes: bytes.into(), content_type: Some(content_type.to_string()) };
        self.insert(path, Canned::Response(response))
    }

    /// Make every call to `path` fail with the error built by `error`.
    pub fn with_error(self, path: &str, error: fn() -> Error) -> Self {
        self.insert(path, Canned::Failure(error))
    }

    /// Paths requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn call_count(&self, path: &str) -> usize {
        self.calls().iter().filter(|p| *p == path).count()
    }
}

#[async_trait]
impl SejmApi for MockSejmApi {
    async fn fetch(&self, endpoint: &Endpoint) -> Result<ApiResponse, Error> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).push(endpoint.path.clone());

        let responses = self.responses.lock().unwrap_or_else(|p| p.into_inner());
        match responses.get(&endpoint.path) {
            Some(Canned::Response(response)) => Ok(response.clone()),
            Some(Canned::Failure(error)) => Err(error()),
            None => Ok(ApiResponse::Absent),
        }
    }
}
