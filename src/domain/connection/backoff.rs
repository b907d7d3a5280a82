//! Reconnect delay policy.
//!
//! The delay is a pure function of the retry count so it can be tested
//! without timers. Jitter is applied on top by the caller through an
//! injected sampler.

use std::time::Duration;

/// How randomness is applied to the computed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Jitter {
    /// Use the computed delay as-is.
    None,
    /// Sample uniformly from `[0, delay]`.
    #[default]
    Full,
}

/// Exponential backoff with a ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub factor: u32,
    pub cap: Duration,
    pub jitter: Jitter,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::exponential(Duration::from_secs(1), 2, Duration::from_secs(10))
    }
}

impl BackoffPolicy {
    /// `base * factor^(retry-1)`, capped, with full jitter.
    pub fn exponential(base: Duration, factor: u32, cap: Duration) -> Self {
        Self {
            base,
            factor: factor.max(1),
            cap,
            jitter: Jitter::Full,
        }
    }

    /// Flat delay between every attempt, no jitter.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            base: delay,
            factor: 1,
            cap: delay,
            jitter: Jitter::None,
        }
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay ceiling before the `retry`-th reconnect attempt (1-based).
    ///
    /// `retry == 0` is treated as the first retry.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        let cap_ms = self.cap.as_millis();
        let delay_ms = match u128::from(self.factor).checked_pow(exponent) {
            Some(multiplier) => self.base.as_millis().saturating_mul(multiplier).min(cap_ms),
            None => cap_ms,
        };
        Duration::from_millis(u64::try_from(delay_ms).unwrap_or(u64::MAX))
    }

    /// Delay before the `retry`-th attempt with jitter applied via `sample`.
    ///
    /// `sample` receives the ceiling and must return a value in `[0, ceiling]`;
    /// out-of-range samples are clamped.
    pub fn delay_with(&self, retry: u32, sample: impl FnOnce(Duration) -> Duration) -> Duration {
        let ceiling = self.delay_for(retry);
        match self.jitter {
            Jitter::None => ceiling,
            Jitter::Full => sample(ceiling).min(ceiling),
        }
    }
}
