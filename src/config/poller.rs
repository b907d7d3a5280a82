//! Fallback poller configuration

use secrecy::Secret;
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::require_http_url;
use crate::adapters::http::HttpPullConfig;

/// Fallback poller configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PollerSettings {
    /// REST endpoint returning the latest message(s)
    pub url: String,

    #[serde(default)]
    pub auth_token: Option<Secret<String>>,

    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl PollerSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Settings for the HTTP pull adapter
    pub fn pull_config(&self) -> HttpPullConfig {
        let config = HttpPullConfig::new(&self.url).with_request_timeout(self.request_timeout());
        match &self.auth_token {
            Some(token) => config.with_auth_token(token.clone()),
            None => config,
        }
    }

    /// Validate poller configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_http_url(&self.url, "POLLER__URL")?;
        if self.interval_ms == 0 {
            return Err(ValidationError::ZeroDuration("POLLER__INTERVAL_MS"));
        }
        if self.request_timeout_ms == 0 {
            return Err(ValidationError::ZeroDuration("POLLER__REQUEST_TIMEOUT_MS"));
        }
        Ok(())
    }
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            auth_token: None,
            interval_ms: default_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_interval_ms() -> u64 {
    5_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}
