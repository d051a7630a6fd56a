//! Error types returned by the pipeline.

use serde_json::Value;
use thiserror::Error;
use turbo_data::TransportError;

/// Payload of [`ApiError::SessionExpired`].
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please sign in again.";

/// Normalized outcome of a failed API call.
///
/// Every failure leaves [`AuthPipeline::execute`](crate::AuthPipeline::execute)
/// as one of these values; nothing is thrown past it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The backend answered with a non-2xx status (401 included, when it
    /// came from a replayed request).
    #[error("HTTP {status}")]
    Http { status: u16, payload: Value },

    /// No HTTP answer at all: connection failure, timeout, bad URL.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// Authorization failed and the session could not be renewed. The
    /// session has been cleared.
    #[error("{}", SESSION_EXPIRED_MESSAGE)]
    SessionExpired,

    /// The call succeeded but the body did not decode into the requested type.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// HTTP status, if any. `SessionExpired` reports 401.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::SessionExpired => Some(http::StatusCode::UNAUTHORIZED.as_u16()),
            ApiError::Transport { .. } | ApiError::Decode(_) => None,
        }
    }

    /// The server payload, or a message standing in for it.
    pub fn payload(&self) -> Value {
        match self {
            ApiError::Http { payload, .. } => payload.clone(),
            ApiError::Transport { message } => Value::String(message.clone()),
            ApiError::SessionExpired => Value::String(SESSION_EXPIRED_MESSAGE.to_string()),
            ApiError::Decode(message) => Value::String(message.clone()),
        }
    }

    /// Check if the caller should treat this as a forced sign-out.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired)
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Status {
                status,
                payload,
                message,
            } => ApiError::Http {
                status,
                payload: payload.unwrap_or(Value::String(message)),
            },
            other => ApiError::Transport {
                message: other.to_string(),
            },
        }
    }
}

/// Errors raised while setting a client up.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}
