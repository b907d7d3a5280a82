//! EventReconciler - Dedup and merge for raw inbound messages.
//!
//! `ingest` is synchronous. Dedup check-and-insert and merge run under the
//! state mutex; publishing runs under a separate delivery gate that is taken
//! before the merge and held until every handler has returned. Updates are
//! therefore delivered in merge order even when several threads ingest at
//! once, while `snapshot` and `stats` stay readable during a slow delivery.
//! Handlers must not call `ingest` themselves.
//!
//! Identity priority:
//! 1. the message's own `id`
//! 2. the hint attached by the producer (polled messages)
//! 3. a synthesized content hash plus arrival time

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::foundation::DomainError;
use crate::domain::reconciliation::{DedupWindow, EntityKey, EntityState, EntityUpdate};
use crate::domain::stream::{EventIdentity, RawMessage, StreamEnvelope};
use crate::ports::EventPublisher;

/// What happened to one ingested message.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// Merged and handed to the dispatcher.
    Published {
        topic: String,
        key: EntityKey,
        version: u64,
    },
    /// Identity already in the dedup window.
    Duplicate { identity: EventIdentity },
    /// Unparseable; entity state untouched.
    Dropped { reason: DomainError },
}

impl IngestOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, IngestOutcome::Published { .. })
    }
}

/// Running counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcilerStats {
    pub accepted: u64,
    pub duplicates: u64,
    pub dropped: u64,
}

struct ReconcilerState {
    window: DedupWindow,
    entities: HashMap<EntityKey, EntityState>,
    stats: ReconcilerStats,
}

pub struct EventReconciler {
    state: Mutex<ReconcilerState>,
    /// Held across merge and publish.
    delivery: Mutex<()>,
    publisher: Arc<dyn EventPublisher>,
}

impl EventReconciler {
    pub fn new(window: DedupWindow, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            state: Mutex::new(ReconcilerState {
                window,
                entities: HashMap::new(),
                stats: ReconcilerStats::default(),
            }),
            delivery: Mutex::new(()),
            publisher,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ReconcilerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reconciles one message and publishes the result.
    ///
    /// Never fails: parse errors and duplicates are reported through the
    /// outcome and logged.
    pub fn ingest(&self, raw: RawMessage) -> IngestOutcome {
        let envelope = match StreamEnvelope::parse(&raw.payload) {
            Ok(envelope) => envelope,
            Err(reason) => {
                self.lock().stats.dropped += 1;
                tracing::warn!(source = %raw.source, error = %reason, "Dropping unparseable message");
                return IngestOutcome::Dropped { reason };
            }
        };

        let StreamEnvelope {
            event_id,
            sequence,
            event,
        } = envelope;
        let identity = event_id
            .or(raw.identity_hint)
            .unwrap_or_else(|| EventIdentity::synthesize(&raw.payload, raw.received_at));

        let _delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
        let update = {
            let mut state = self.lock();
            if !state.window.should_process(&identity) {
                state.stats.duplicates += 1;
                drop(state);
                tracing::warn!(
                    event_id = %identity,
                    topic = %event.topic(),
                    source = %raw.source,
                    "Suppressed duplicate event"
                );
                return IngestOutcome::Duplicate { identity };
            }

            let key = event.entity_key();
            let next = state
                .entities
                .get(&key)
                .cloned()
                .unwrap_or_else(|| EntityState::empty(key.clone()))
                .merged(event.delta(), raw.received_at);
            state.entities.insert(key, next.clone());
            state.stats.accepted += 1;

            EntityUpdate {
                event_id: identity,
                topic: event.topic().to_string(),
                event,
                state: next,
                source: raw.source,
                sequence,
                received_at: raw.received_at,
            }
        };

        if update.event.is_unknown() {
            tracing::debug!(topic = %update.topic, "Reconciled event of unrecognised type");
        }
        tracing::debug!(
            event_id = %update.event_id,
            entity = %update.state.key,
            version = update.state.version,
            "Reconciled event"
        );

        self.publisher.publish(&update.topic, &update);

        IngestOutcome::Published {
            topic: update.topic,
            key: update.state.key,
            version: update.state.version,
        }
    }

    /// Current snapshot of one entity.
    pub fn snapshot(&self, key: &EntityKey) -> Option<EntityState> {
        self.lock().entities.get(key).cloned()
    }

    /// Keys of every entity seen so far, sorted.
    pub fn tracked_entities(&self) -> Vec<EntityKey> {
        let mut keys: Vec<_> = self.lock().entities.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn stats(&self) -> ReconcilerStats {
        self.lock().stats
    }

    /// Identities currently held by the dedup window.
    pub fn window_len(&self) -> usize {
        self.lock().window.len()
    }
}
