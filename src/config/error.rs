//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid URL for {0}: expected http:// or https://")]
    InvalidUrl(&'static str),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("Reconnect base delay exceeds max delay")]
    BaseDelayExceedsMax,

    #[error("Reconnect factor must be at least 1")]
    InvalidFactor,

    #[error("Dedup eviction batch must be between 1 and the window size")]
    InvalidEvictionBatch,

    #[error("Invalid log filter: {0}")]
    InvalidLogFilter(String),
}
