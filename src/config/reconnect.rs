//! Reconnect backoff configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::connection::{BackoffPolicy, Jitter};

/// Reconnect backoff configuration
///
/// Delay before retry `n` is `min(max_delay, base_delay * factor^(n-1))`,
/// optionally with full jitter.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// 1 gives a flat retry interval
    #[serde(default = "default_factor")]
    pub factor: u32,

    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

impl ReconnectConfig {
    pub fn backoff_policy(&self) -> BackoffPolicy {
        let jitter = if self.jitter { Jitter::Full } else { Jitter::None };
        BackoffPolicy::exponential(
            Duration::from_millis(self.base_delay_ms),
            self.factor,
            Duration::from_millis(self.max_delay_ms),
        )
        .with_jitter(jitter)
    }

    /// Validate backoff bounds
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.base_delay_ms == 0 {
            return Err(ValidationError::ZeroDuration("RECONNECT__BASE_DELAY_MS"));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(ValidationError::BaseDelayExceedsMax);
        }
        if self.factor == 0 {
            return Err(ValidationError::InvalidFactor);
        }
        Ok(())
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            factor: default_factor(),
            jitter: default_jitter(),
        }
    }
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_factor() -> u32 {
    2
}

fn default_jitter() -> bool {
    true
}
