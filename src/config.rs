//! Engine configuration module
//!
//! Provides configuration for the confirmation queue, finality polling,
//! and the HTTP service bindings.

use std::time::Duration;
use thiserror::Error;

/// Default backend URL used when no override is configured.
const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

/// Default budget for the finality wait of a single confirmation request.
const DEFAULT_FINALITY_TIMEOUT: Duration = Duration::from_secs(45);

/// Default interval between block-presence polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the remote write service.
    pub server_url: String,
    /// Budget for awaiting finality of one write.
    pub finality_timeout: Duration,
    /// Interval between block-presence polls.
    pub poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let server_url = std::env::var("COLLECTION_API_URL")
            .unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
        Self {
            server_url,
            finality_timeout: DEFAULT_FINALITY_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl EngineConfig {
    /// Create an EngineConfigBuilder
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Get the full URL for an API endpoint
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url, path)
    }
}

/// Builder for EngineConfig
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    server_url: Option<String>,
    finality_timeout: Option<Duration>,
    poll_interval: Option<Duration>,
}

impl EngineConfigBuilder {
    /// Set the backend base URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    /// Set the finality wait budget
    pub fn finality_timeout(mut self, timeout: Duration) -> Self {
        self.finality_timeout = Some(timeout);
        self
    }

    /// Set the block-poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        let defaults = EngineConfig::default();
        let poll_interval = self.poll_interval.unwrap_or(defaults.poll_interval);
        if poll_interval.is_zero() {
            return Err(ConfigError::InvalidInterval("poll_interval"));
        }
        Ok(EngineConfig {
            server_url: self.server_url.unwrap_or(defaults.server_url),
            finality_timeout: self.finality_timeout.unwrap_or(defaults.finality_timeout),
            poll_interval,
        })
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("interval must be non-zero: {0}")]
    InvalidInterval(&'static str),
}
