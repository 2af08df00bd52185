//! Backend connection settings.

use std::time::Duration;

use ccbell_core::config::{env_parse, ConfigError};

use crate::client::{ws_url_from_api_url, DEFAULT_HEARTBEAT_INTERVAL};

/// Default backend base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:7860";

/// Default HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// How to reach the generation backend.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// HTTP base URL (default: `http://localhost:7860`).
    pub api_url: String,
    /// WebSocket base URL (default: derived from `api_url`).
    pub ws_url: String,
    /// Push channel keep-alive interval (default: 30s).
    pub heartbeat_interval: Duration,
    /// Per-request HTTP timeout (default: 30s).
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::for_api_url(DEFAULT_API_URL)
    }
}

impl ClientConfig {
    /// Defaults for a specific backend URL.
    pub fn for_api_url(api_url: &str) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            ws_url: ws_url_from_api_url(api_url),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                  |
    /// |------------------------------|--------------------------|
    /// | `CCBELL_API_URL`             | `http://localhost:7860`  |
    /// | `CCBELL_WS_URL`              | derived from the API URL |
    /// | `CCBELL_HEARTBEAT_SECS`      | `30`                     |
    /// | `CCBELL_REQUEST_TIMEOUT_SECS`| `30`                     |
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = std::env::var("CCBELL_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());
        let mut config = Self::for_api_url(&api_url);

        if let Ok(ws_url) = std::env::var("CCBELL_WS_URL") {
            config.ws_url = ws_url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = env_parse::<u64>("CCBELL_HEARTBEAT_SECS")? {
            config.heartbeat_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("CCBELL_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Build the REST client with the configured timeout.
    pub fn build_api(&self) -> Result<crate::api::GeneratorApi, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()?;
        Ok(crate::api::GeneratorApi::with_client(http, self.api_url.clone()))
    }

    /// Build the push channel client.
    pub fn build_channel_client(&self) -> crate::client::ProgressChannelClient {
        crate::client::ProgressChannelClient::new(self.ws_url.clone())
            .with_heartbeat_interval(self.heartbeat_interval)
    }
}
