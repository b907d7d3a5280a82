//! The payload the reconciler hands to the dispatcher.

use crate::domain::foundation::Timestamp;
use crate::domain::stream::{EventIdentity, MessageSource, StreamEvent};

use super::EntityState;

/// One accepted event together with the entity snapshot it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityUpdate {
    pub event_id: EventIdentity,
    /// Dispatcher topic (the wire event type).
    pub topic: String,
    /// The decoded event, including the delta that was merged.
    pub event: StreamEvent,
    /// Snapshot after the merge.
    pub state: EntityState,
    pub source: MessageSource,
    pub sequence: Option<u64>,
    pub received_at: Timestamp,
}
