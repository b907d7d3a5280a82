//! JitterSource port - Randomness for reconnect delays.
//!
//! Injected so tests can pin the delay sequence.

use std::time::Duration;

pub trait JitterSource: Send + Sync {
    /// Returns a delay in `[0, ceiling]`.
    fn sample(&self, ceiling: Duration) -> Duration;
}
