//! Dedup window configuration

use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::reconciliation::{DEFAULT_EVICTION_BATCH, DEFAULT_WINDOW_SIZE};

/// Dedup window configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DedupConfig {
    /// Maximum identities remembered (`N`)
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Oldest identities dropped at once when the window overflows (`K`)
    #[serde(default = "default_eviction_batch")]
    pub eviction_batch: usize,
}

impl DedupConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.eviction_batch == 0 || self.eviction_batch > self.window_size {
            return Err(ValidationError::InvalidEvictionBatch);
        }
        Ok(())
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            eviction_batch: default_eviction_batch(),
        }
    }
}

fn default_window_size() -> usize {
    DEFAULT_WINDOW_SIZE
}

fn default_eviction_batch() -> usize {
    DEFAULT_EVICTION_BATCH
}
