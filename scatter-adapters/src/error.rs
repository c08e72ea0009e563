//! Error types for adapters.

use thiserror::Error;

/// Errors that can occur when querying a remote data source.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The service answered with a non-success status.
    #[error("Service returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,

    /// A retryable failure persisted through every attempt.
    #[error("Giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<AdapterError>,
    },
}

impl AdapterError {
    /// Whether the request may succeed if sent again: timeouts, connection
    /// failures, throttling (429) and server errors (5xx).
    pub fn is_retryable(&self) -> bool {
        match self {
            AdapterError::Timeout | AdapterError::Connection(_) => true,
            AdapterError::Status { status, .. } => *status == 429 || *status >= 500,
            AdapterError::Http(_)
            | AdapterError::Parse(_)
            | AdapterError::RetriesExhausted { .. } => false,
        }
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout
        } else if err.is_connect() {
            AdapterError::Connection(err.to_string())
        } else {
            AdapterError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttling_and_server_errors_are_retryable() {
        let status = |status| AdapterError::Status {
            status,
            message: String::new(),
        };
        assert!(status(429).is_retryable());
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!status(404).is_retryable());
    }

    #[test]
    fn transport_failures_are_retryable() {
        assert!(AdapterError::Timeout.is_retryable());
        assert!(AdapterError::Connection("refused".to_string()).is_retryable());
        assert!(!AdapterError::Parse("eof".to_string()).is_retryable());
    }

    #[test]
    fn exhausted_retries_keep_last_error() {
        let err = AdapterError::RetriesExhausted {
            attempts: 7,
            last: Box::new(AdapterError::Timeout),
        };
        assert_eq!(err.to_string(), "Giving up after 7 attempts: Request timed out");
        assert!(!err.is_retryable());
        assert!(std::error::Error::source(&err).is_some());
    }
}
