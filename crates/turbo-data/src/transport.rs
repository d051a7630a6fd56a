//! The transport seam and its reqwest-backed implementation.

use crate::{PendingRequest, Response, TransportError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, trace};

/// Performs a single HTTP request.
///
/// Implementations are stateless per call: they never retry and never touch
/// credentials. A non-2xx answer is reported as [`TransportError::Status`].
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send the request and return the response or a transport error.
    async fn send(&self, request: &PendingRequest) -> Result<Response, TransportError>;
}

/// [`HttpTransport`] implemented on top of `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        Self::builder(timeout, None)
    }

    /// Create a transport with a timeout and a `User-Agent`.
    pub fn builder(timeout: Duration, user_agent: Option<&str>) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if let Some(agent) = user_agent {
            builder = builder.user_agent(agent.to_string());
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &PendingRequest) -> Result<Response, TransportError> {
        debug!(method = %request.method, url = %request.url, "sending request");

        let mut builder = self
            .client
            .request(request.method.into(), request.url.as_str());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();
        let body = response.bytes().await?.to_vec();

        trace!(status, bytes = body.len(), url = %request.url, "response received");

        Response::new(status, headers, body).error_for_status()
    }
}
