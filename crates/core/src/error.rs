//! Unified error types for sejmbot.
//!
//! Every failure carries an explicit kind so retry decisions can be made with an
//! exhaustive match instead of inspecting messages.

/// Unified error types for the scraper.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty endpoint).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Content extraction failed.
    #[error("EXTRACT_FAILED: {0}")]
    ExtractFailed(String),

    /// Request did not complete within the configured timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    Timeout(String),

    /// TCP/TLS connection could not be established or was dropped.
    #[error("CONNECTION_FAILED: {0}")]
    ConnectionFailed(String),

    /// Non-success HTTP response.
    #[error("HTTP_ERROR: status {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// Upstream asked us to slow down (HTTP 429).
    #[error("RATE_LIMITED: {0}")]
    RateLimited(String),

    /// Response body could not be decoded.
    #[error("PARSE_ERROR: {0}")]
    Parse(String),

    /// Date string not in `YYYY-MM-DD` form.
    #[error("INVALID_DATE: {0}")]
    InvalidDate(String),

    /// Persisted cache state could not be read back.
    #[error("CACHE_CORRUPT: {0}")]
    CacheCorrupt(String),

    /// Filesystem operation failed.
    #[error("IO_ERROR: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed.
    #[error("JSON_ERROR: {0}")]
    Json(#[from] serde_json::Error),

    /// Anything the transport could not classify.
    #[error("UNKNOWN: {0}")]
    Unknown(String),
}

impl Error {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::HttpStatus { status, .. } => Some(*status),
            Error::RateLimited(_) => Some(429),
            _ => None,
        }
    }

    /// Whether the failure is a server-side (5xx) response.
    pub fn is_server_error(&self) -> bool {
        matches!(self.status(), Some(500..=599))
    }

    /// Whether the failure means the resource does not exist (yet) or is forbidden.
    pub fn is_permanent(&self) -> bool {
        matches!(self.status(), Some(403) | Some(404))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::HttpStatus { status: 503, url: "/sejm/term10".to_string() };
        assert!(err.to_string().contains("HTTP_ERROR"));
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_status_classification() {
        assert!(Error::HttpStatus { status: 502, url: String::new() }.is_server_error());
        assert!(Error::HttpStatus { status: 404, url: String::new() }.is_permanent());
        assert!(Error::HttpStatus { status: 403, url: String::new() }.is_permanent());
        assert!(!Error::HttpStatus { status: 400, url: String::new() }.is_permanent());
        assert_eq!(Error::RateLimited("slow down".into()).status(), Some(429));
        assert_eq!(Error::Timeout("t".into()).status(), None);
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
