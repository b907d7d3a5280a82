//! Raw inbound messages as produced by the push and pull paths.

use serde_json::Value as JsonValue;
use std::fmt;

use super::EventIdentity;
use crate::domain::foundation::Timestamp;

/// Which upstream produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageSource {
    /// Server-pushed stream frame.
    Push,
    /// Fallback poll response.
    Poll,
}

impl fmt::Display for MessageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageSource::Push => write!(f, "push"),
            MessageSource::Poll => write!(f, "poll"),
        }
    }
}

/// One decoded JSON message plus its arrival context.
///
/// Consumed once by the reconciler and never retained.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub payload: JsonValue,
    pub received_at: Timestamp,
    pub source: MessageSource,
    /// Identity attached by the producer, used when the payload has no `id`.
    pub identity_hint: Option<EventIdentity>,
}

impl RawMessage {
    /// A frame received on the push channel.
    pub fn pushed(payload: JsonValue) -> Self {
        Self {
            payload,
            received_at: Timestamp::now(),
            source: MessageSource::Push,
            identity_hint: None,
        }
    }

    /// Attaches a producer identity, used when the payload has no `id`.
    pub fn with_identity_hint(mut self, identity: EventIdentity) -> Self {
        self.identity_hint = Some(identity);
        self
    }

    /// A message pulled by the poller, tagged with a payload+poll-time identity.
    pub fn polled(payload: JsonValue, polled_at: Timestamp) -> Self {
        let identity_hint = Some(EventIdentity::synthesize(&payload, polled_at));
        Self {
            payload,
            received_at: polled_at,
            source: MessageSource::Poll,
            identity_hint,
        }
    }
}
