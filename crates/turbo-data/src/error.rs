//! Transport error types.

use thiserror::Error;

/// Errors that can occur when sending a request over the wire.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Status {
        status: u16,
        /// Parsed error body, if the server sent one.
        payload: Option<serde_json::Value>,
        message: String,
    },

    /// Failed to send the request or read the response.
    #[error("Request failed: {0}")]
    Request(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Request timeout.
    #[error("Request timed out")]
    Timeout,

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(String),
}

impl TransportError {
    /// HTTP status carried by this error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if the server rejected the request as unauthorized (401).
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(http::StatusCode::UNAUTHORIZED.as_u16())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::Json(e.to_string())
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_builder() {
            TransportError::InvalidUrl(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_accessor() {
        let err = TransportError::Status {
            status: 503,
            payload: None,
            message: "unavailable".to_string(),
        };
        assert_eq!(err.status(), Some(503));
        assert!(!err.is_unauthorized());
        assert_eq!(TransportError::Timeout.status(), None);
    }

    #[test]
    fn test_is_unauthorized() {
        let err = TransportError::Status {
            status: 401,
            payload: Some(serde_json::json!({"message": "jwt expired"})),
            message: "HTTP 401".to_string(),
        };
        assert!(err.is_unauthorized());
        assert!(!TransportError::Request("connection reset".into()).is_unauthorized());
    }
}
