//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables use the `LIVEFEED` prefix and
//! nested values are separated by double underscores.
//!
//! # Example
//!
//! ```no_run
//! use livefeed::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Streaming from {}", config.stream.url);
//! ```

mod dedup;
mod error;
mod poller;
mod reconnect;
mod stream;
mod telemetry;

pub use dedup::DedupConfig;
pub use error::{ConfigError, ValidationError};
pub use poller::PollerSettings;
pub use reconnect::ReconnectConfig;
pub use stream::StreamConfig;
pub use telemetry::TelemetryConfig;

use serde::Deserialize;

use crate::application::{ConnectorConfig, PipelineConfig, PollerConfig};

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Push stream endpoint and timeouts
    pub stream: StreamConfig,

    /// Reconnect backoff
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Fallback pull endpoint
    pub poller: PollerSettings,

    /// Duplicate suppression window
    #[serde(default)]
    pub dedup: DedupConfig,

    /// Logging
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with the `LIVEFEED` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// # Environment Variable Format
    ///
    /// - `LIVEFEED__STREAM__URL=https://...` -> `stream.url`
    /// - `LIVEFEED__POLLER__INTERVAL_MS=5000` -> `poller.interval_ms`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values
    /// cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("LIVEFEED")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for the first invalid section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.stream.validate()?;
        self.reconnect.validate()?;
        self.poller.validate()?;
        self.dedup.validate()?;
        self.telemetry.validate()?;
        Ok(())
    }

    /// Settings for assembling an [`IngestionPipeline`](crate::application::IngestionPipeline)
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            connector: ConnectorConfig::default()
                .with_connect_timeout(self.stream.connect_timeout())
                .with_idle_timeout(self.stream.idle_timeout())
                .with_backoff(self.reconnect.backoff_policy()),
            poller: PollerConfig {
                interval: self.poller.interval(),
            },
            window_size: self.dedup.window_size,
            eviction_batch: self.dedup.eviction_batch,
            ..PipelineConfig::default()
        }
    }
}

/// Checks that a required URL is present and uses http(s).
fn require_http_url(url: &str, name: &'static str) -> Result<(), ValidationError> {
    if url.is_empty() {
        return Err(ValidationError::MissingRequired(name));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ValidationError::InvalidUrl(name));
    }
    Ok(())
}
