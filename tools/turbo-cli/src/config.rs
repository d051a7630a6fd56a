//! CLI configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use turbo_client::ClientConfig;

/// Backend used when no config file is found.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// CLI configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// API client configuration.
    pub client: ClientConfig,

    /// Session persistence.
    #[serde(default)]
    pub session: SessionConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::new(DEFAULT_BASE_URL),
            session: SessionConfig::default(),
        }
    }
}

impl CliConfig {
    /// Load config from a file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        if path.ends_with(".json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path))
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path))
        }
    }
}

/// Where the session is kept between invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session file, relative to the config file's directory.
    #[serde(default = "default_session_file")]
    pub file: String,
}

fn default_session_file() -> String {
    ".turbo/session.json".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            file: default_session_file(),
        }
    }
}

/// Generate a default turbo.toml config file.
pub fn generate_default_config(base_url: &str) -> String {
    format!(
        r#"# TurboCommerce client configuration

[client]
base_url = "{base_url}"
refresh_path = "/auth/refresh"
request_timeout_secs = 30
refresh_timeout_secs = 10
# user_agent = "turbo-cli"

[client.default_headers]
Accept = "application/json"

[session]
file = ".turbo/session.json"
"#,
        base_url = base_url
    )
}
