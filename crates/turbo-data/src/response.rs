//! HTTP response handling.

use crate::TransportError;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// An HTTP response as returned by a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// The HTTP status code.
    pub status: u16,
    /// The response headers.
    pub headers: HashMap<String, String>,
    /// The response body.
    pub body: Vec<u8>,
}

impl Response {
    /// Create a new response.
    pub fn new(status: u16, headers: HashMap<String, String>, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// A 200 response carrying a JSON body. Mostly useful for fakes.
    pub fn json_ok(value: &serde_json::Value) -> Self {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self::new(200, headers, value.to_string().into_bytes())
    }

    /// Check if the response was successful (2xx status).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the response body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_slice(&self.body).map_err(Into::into)
    }

    /// Get the raw response body.
    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    /// Best-effort view of the body as a JSON value.
    ///
    /// JSON bodies are parsed, other non-empty bodies become a JSON string,
    /// an empty body yields `None`.
    pub fn payload(&self) -> Option<serde_json::Value> {
        if self.body.is_empty() {
            return None;
        }
        match serde_json::from_slice(&self.body) {
            Ok(value) => Some(value),
            Err(_) => Some(serde_json::Value::String(
                String::from_utf8_lossy(&self.body).into_owned(),
            )),
        }
    }

    /// Get a header value.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Get the Content-Type header.
    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    /// Convert to a Result, returning [`TransportError::Status`] for non-2xx codes.
    pub fn error_for_status(self) -> Result<Self, TransportError> {
        if self.is_success() {
            return Ok(self);
        }
        let message = match http::StatusCode::from_u16(self.status) {
            Ok(code) => format!(
                "{} {}",
                code.as_u16(),
                code.canonical_reason().unwrap_or("Unknown Status")
            ),
            Err(_) => format!("status {}", self.status),
        };
        Err(TransportError::Status {
            status: self.status,
            payload: self.payload(),
            message,
        })
    }
}
