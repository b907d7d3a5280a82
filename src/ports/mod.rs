//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the pipeline and the outside world. Adapters implement these ports.
//!
//! ## Upstream Ports
//!
//! - `PushChannel` - Long-lived server push stream (SSE / NDJSON)
//! - `PullSource` - REST endpoint used by the fallback poller
//! - `JitterSource` - Randomness for reconnect backoff
//!
//! ## Downstream Ports
//!
//! - `EventPublisher` - Delivers reconciled updates
//! - `EventSubscriber` - Registers consumers per topic
//! - `EventHandler` - A consumer callback

mod event_publisher;
mod event_subscriber;
mod jitter;
mod pull_source;
mod push_channel;

pub use event_publisher::{DeliveryReport, EventPublisher};
pub use event_subscriber::{EventHandler, EventSubscriber, SubscriptionToken};
pub use jitter::JitterSource;
pub use pull_source::PullSource;
pub use push_channel::{Frame, FrameStream, PushChannel, TransportError};
