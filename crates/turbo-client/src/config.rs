//! Client configuration.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ClientError;

fn default_refresh_path() -> String {
    "/auth/refresh".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_refresh_timeout_secs() -> u64 {
    10
}

/// Configuration of an [`AuthPipeline`](crate::AuthPipeline).
///
/// Deserializable from TOML or JSON:
///
/// ```toml
/// base_url = "https://api.shop.example.com"
/// refresh_path = "/auth/refresh"
/// request_timeout_secs = 30
/// refresh_timeout_secs = 10
///
/// [default_headers]
/// X-Client = "storefront-ios"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend root that relative request paths are joined onto.
    pub base_url: String,

    /// Path of the token refresh endpoint.
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,

    /// Per-request timeout enforced by the transport.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Upper bound on the refresh call. Expiry counts as a failed refresh.
    #[serde(default = "default_refresh_timeout_secs")]
    pub refresh_timeout_secs: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Headers added to every request built through the pipeline.
    #[serde(default)]
    pub default_headers: HashMap<String, String>,
}

impl ClientConfig {
    /// Create a configuration with defaults for everything but the base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            refresh_path: default_refresh_path(),
            request_timeout_secs: default_request_timeout_secs(),
            refresh_timeout_secs: default_refresh_timeout_secs(),
            user_agent: None,
            default_headers: HashMap::new(),
        }
    }

    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    pub fn with_refresh_timeout_secs(mut self, secs: u64) -> Self {
        self.refresh_timeout_secs = secs;
        self
    }

    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn with_default_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(key.into(), value.into());
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }

    /// Full URL of the refresh endpoint.
    pub fn refresh_url(&self) -> String {
        turbo_data::resolve_url(Some(&self.base_url), &self.refresh_path)
    }

    /// Load config from a file. `.json` files are parsed as JSON, anything
    /// else as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ClientError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let config: Self = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .map_err(|e| ClientError::Config(format!("{}: {}", path.display(), e)))?
        } else {
            Self::from_toml_str(&content)
                .map_err(|e| ClientError::Config(format!("{}: {}", path.display(), e)))?
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ClientError> {
        toml::from_str(content).map_err(|e| ClientError::Config(e.to_string()))
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String, ClientError> {
        toml::to_string_pretty(self).map_err(|e| ClientError::Config(e.to_string()))
    }

    /// Check the values make sense together.
    pub fn validate(&self) -> Result<(), ClientError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if !self.refresh_path.starts_with('/') {
            return Err(ClientError::Config(format!(
                "refresh_path must start with '/', got '{}'",
                self.refresh_path
            )));
        }
        if self.request_timeout_secs == 0 || self.refresh_timeout_secs == 0 {
            return Err(ClientError::Config(
                "timeouts must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}
