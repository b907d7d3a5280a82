//! Stream message model: raw inbound messages, identities and typed events.

mod event;
mod identity;
mod message;

pub use event::{Delta, StreamEnvelope, StreamEvent, INCIDENT_EVENT, METRICS_EVENT, SESSION_EVENT};
pub use identity::EventIdentity;
pub use message::{MessageSource, RawMessage};
