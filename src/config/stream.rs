//! Push stream configuration

use secrecy::Secret;
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::require_http_url;
use crate::adapters::http::{Framing, HttpPushConfig};

/// Push stream configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// Address of the long-lived event stream
    pub url: String,

    /// Body framing (`sse` or `ndjson`)
    #[serde(default)]
    pub framing: Framing,

    /// Bearer token sent with the stream request
    #[serde(default)]
    pub auth_token: Option<Secret<String>>,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// No frame or heartbeat for this long counts as a dead stream
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

impl StreamConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Settings for the HTTP push adapter
    pub fn push_config(&self) -> HttpPushConfig {
        let config = HttpPushConfig::new(&self.url)
            .with_framing(self.framing)
            .with_connect_timeout(self.connect_timeout());
        match &self.auth_token {
            Some(token) => config.with_auth_token(token.clone()),
            None => config,
        }
    }

    /// Validate stream configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_http_url(&self.url, "STREAM__URL")?;
        if self.connect_timeout_ms == 0 {
            return Err(ValidationError::ZeroDuration("STREAM__CONNECT_TIMEOUT_MS"));
        }
        if self.idle_timeout_ms == 0 {
            return Err(ValidationError::ZeroDuration("STREAM__IDLE_TIMEOUT_MS"));
        }
        Ok(())
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            framing: Framing::default(),
            auth_token: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_idle_timeout_ms() -> u64 {
    60_000
}
