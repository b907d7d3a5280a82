//! Typed stream events.
//!
//! Every inbound JSON message is parsed into a [`StreamEnvelope`] whose
//! [`StreamEvent`] names the entity kind it updates. Unknown event types are
//! kept in their own variant so a newer server never breaks an older client.
//!
//! Wire shape:
//!
//! ```text
//! { "id": "e1", "type": "metrics", "value": { "a": 1 }, "entity": "eu-west", "seq": 7 }
//! ```

use serde_json::{Map, Value as JsonValue};

use super::EventIdentity;
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::reconciliation::EntityKey;

/// A partial update: top-level keys to overwrite on the target entity.
pub type Delta = Map<String, JsonValue>;

/// Event type discriminator for dashboard metrics.
pub const METRICS_EVENT: &str = "metrics";
/// Event type discriminator for session records.
pub const SESSION_EVENT: &str = "session";
/// Event type discriminator for incident records.
pub const INCIDENT_EVENT: &str = "incident";

const DEFAULT_METRICS_SCOPE: &str = "global";
const DEFAULT_UNKNOWN_ENTITY: &str = "default";

/// One decoded event, by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Dashboard metrics object; one per scope.
    Metrics { scope: String, delta: Delta },
    /// Session record keyed by session id.
    Session { session_id: String, delta: Delta },
    /// Incident record keyed by incident id.
    Incident { incident_id: String, delta: Delta },
    /// Any event type this build does not know about.
    Unknown {
        event_type: String,
        entity: String,
        delta: Delta,
    },
}

impl StreamEvent {
    /// Dispatcher topic for this event (the wire `type`).
    pub fn topic(&self) -> &str {
        match self {
            StreamEvent::Metrics { .. } => METRICS_EVENT,
            StreamEvent::Session { .. } => SESSION_EVENT,
            StreamEvent::Incident { .. } => INCIDENT_EVENT,
            StreamEvent::Unknown { event_type, .. } => event_type,
        }
    }

    /// Entity whose state this event updates.
    pub fn entity_key(&self) -> EntityKey {
        match self {
            StreamEvent::Metrics { scope, .. } => EntityKey::new(METRICS_EVENT, scope.as_str()),
            StreamEvent::Session { session_id, .. } => {
                EntityKey::new(SESSION_EVENT, session_id.as_str())
            }
            StreamEvent::Incident { incident_id, .. } => {
                EntityKey::new(INCIDENT_EVENT, incident_id.as_str())
            }
            StreamEvent::Unknown {
                event_type, entity, ..
            } => EntityKey::new(event_type.as_str(), entity.as_str()),
        }
    }

    /// The partial update carried by this event.
    pub fn delta(&self) -> &Delta {
        match self {
            StreamEvent::Metrics { delta, .. }
            | StreamEvent::Session { delta, .. }
            | StreamEvent::Incident { delta, .. }
            | StreamEvent::Unknown { delta, .. } => delta,
        }
    }

    /// True for event types outside the known set.
    pub fn is_unknown(&self) -> bool {
        matches!(self, StreamEvent::Unknown { .. })
    }
}

/// A parsed message: optional wire identity and sequence plus the event.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEnvelope {
    pub event_id: Option<EventIdentity>,
    /// Informational only; never used to reorder.
    pub sequence: Option<u64>,
    pub event: StreamEvent,
}

impl StreamEnvelope {
    /// Parses one JSON message.
    ///
    /// # Errors
    ///
    /// - `MalformedMessage` if the body or `value` is not an object
    /// - `MissingEventType` if `type` is absent or not a string
    /// - `MissingPayload` if neither `value` nor `payload` is present
    /// - `MissingEntityId` if a keyed kind carries no entity id
    pub fn parse(payload: &JsonValue) -> Result<Self, DomainError> {
        let body = payload
            .as_object()
            .ok_or_else(|| DomainError::malformed("message body is not a JSON object"))?;

        let event_type = body
            .get("type")
            .and_then(JsonValue::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                DomainError::new(ErrorCode::MissingEventType, "message has no string 'type'")
            })?;

        let delta = match body.get("value").or_else(|| body.get("payload")) {
            Some(JsonValue::Object(map)) => map.clone(),
            Some(_) => {
                return Err(DomainError::malformed("'value' is not a JSON object")
                    .with_detail("type", event_type))
            }
            None => {
                return Err(DomainError::new(
                    ErrorCode::MissingPayload,
                    "message has no 'value'",
                )
                .with_detail("type", event_type))
            }
        };

        let event_id = body.get("id").and_then(scalar_text).map(EventIdentity::from_string);
        let entity = body
            .get("entity")
            .or_else(|| body.get("entity_id"))
            .and_then(scalar_text);
        let sequence = body
            .get("seq")
            .or_else(|| body.get("sequence"))
            .and_then(JsonValue::as_u64);

        let event = match event_type {
            METRICS_EVENT => StreamEvent::Metrics {
                scope: entity.unwrap_or_else(|| DEFAULT_METRICS_SCOPE.to_string()),
                delta,
            },
            SESSION_EVENT => StreamEvent::Session {
                session_id: keyed_id(entity, &delta, "session_id", event_type)?,
                delta,
            },
            INCIDENT_EVENT => StreamEvent::Incident {
                incident_id: keyed_id(entity, &delta, "incident_id", event_type)?,
                delta,
            },
            other => StreamEvent::Unknown {
                event_type: other.to_string(),
                entity: entity.unwrap_or_else(|| DEFAULT_UNKNOWN_ENTITY.to_string()),
                delta,
            },
        };

        Ok(Self {
            event_id,
            sequence,
            event,
        })
    }
}

/// Strings pass through; numbers are rendered; everything else is absent.
fn scalar_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn keyed_id(
    entity: Option<String>,
    delta: &Delta,
    id_field: &str,
    event_type: &str,
) -> Result<String, DomainError> {
    entity
        .or_else(|| delta.get(id_field).and_then(scalar_text))
        .or_else(|| delta.get("id").and_then(scalar_text))
        .ok_or_else(|| {
            DomainError::new(
                ErrorCode::MissingEntityId,
                format!("'{}' event has no entity id", event_type),
            )
            .with_detail("expected_field", id_field)
        })
}
