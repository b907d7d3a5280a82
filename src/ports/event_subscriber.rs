//! EventSubscriber port - Interface for registering consumers of entity updates.
//!
//! Consumers (view components, state stores) register handlers per topic
//! without knowing about each other or about the transport behind them.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::domain::foundation::DomainError;
use crate::domain::reconciliation::EntityUpdate;

/// Handler for processing reconciled entity updates.
///
/// Implementations should be:
/// - **Quick** - delivery is synchronous; long work belongs on a task
/// - **Non-blocking** - handlers must not wait on I/O
/// - **Isolated** - a failing handler never affects the others
///
/// # Example
///
/// ```ignore
/// struct MetricsPanel { /* ... */ }
///
/// impl EventHandler for MetricsPanel {
///     fn handle(&self, update: &EntityUpdate) -> Result<(), DomainError> {
///         let metrics: Metrics = update.state.decode()?;
///         self.render(metrics);
///         Ok(())
///     }
///
///     fn name(&self) -> &'static str {
///         "MetricsPanel"
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Process one update.
    fn handle(&self, update: &EntityUpdate) -> Result<(), DomainError>;

    /// Handler name for logging.
    fn name(&self) -> &'static str;
}

/// Capability to remove exactly one registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SubscriptionToken {
    pub(crate) id: u64,
    pub(crate) topic: String,
}

impl SubscriptionToken {
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl fmt::Display for SubscriptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.topic, self.id)
    }
}

/// Port for subscribing to entity updates.
///
/// # Example
///
/// ```ignore
/// let token = subscriber.subscribe("metrics", panel);
/// let tokens = subscriber.subscribe_all(&["session", "incident"], activity_feed);
/// subscriber.unsubscribe(&token);
/// ```
pub trait EventSubscriber: Send + Sync {
    /// Registers `handler` on `topic`. Handlers on one topic are invoked in
    /// registration order.
    fn subscribe(&self, topic: &str, handler: Arc<dyn EventHandler>) -> SubscriptionToken;

    /// Registers the same handler on several topics.
    fn subscribe_all(&self, topics: &[&str], handler: Arc<dyn EventHandler>)
        -> Vec<SubscriptionToken>;

    /// Removes one registration. Returns `false` if it was already gone;
    /// calling it again is never an error.
    fn unsubscribe(&self, token: &SubscriptionToken) -> bool;
}
