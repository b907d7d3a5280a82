//! [`JitterSource`] implementations.

use rand::Rng;
use std::time::Duration;

use crate::ports::JitterSource;

/// Uniform sample from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn sample(&self, ceiling: Duration) -> Duration {
        let max = u64::try_from(ceiling.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::rng().random_range(0..=max))
    }
}

/// Always returns the ceiling. Makes delays deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoJitter;

impl JitterSource for NoJitter {
    fn sample(&self, ceiling: Duration) -> Duration {
        ceiling
    }
}
