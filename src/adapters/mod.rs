//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the pipeline to external systems:
//! - `events` - In-process event dispatcher
//! - `http` - Push stream and pull endpoint over HTTP
//! - `jitter` - Randomness for reconnect backoff

pub mod events;
pub mod http;
pub mod jitter;

pub use events::{EventDispatcher, FnHandler, SubscriptionGuard};
pub use http::{Framing, HttpPullConfig, HttpPullSource, HttpPushChannel, HttpPushConfig};
pub use jitter::{NoJitter, ThreadRngJitter};
