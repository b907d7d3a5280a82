//! In-process publish/subscribe bus for reconciled entity updates.
//!
//! Delivery is synchronous and in registration order. Each publish works on
//! a snapshot of the topic's handlers taken under a short read lock, so
//! `subscribe`/`unsubscribe` may run concurrently with delivery: an
//! unsubscribe affects every publish that starts after it returns, while a
//! publish already in flight may still reach the removed handler.
//!
//! Handler failures are isolated: an `Err` or a panic is logged and
//! counted, and delivery moves on to the next handler.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::reconciliation::EntityUpdate;
use crate::ports::{DeliveryReport, EventHandler, EventPublisher, EventSubscriber, SubscriptionToken};

struct Registration {
    id: u64,
    handler: Arc<dyn EventHandler>,
}

#[derive(Default)]
struct Registry {
    topics: RwLock<HashMap<String, Vec<Registration>>>,
    next_id: AtomicU64,
}

impl Registry {
    fn insert(&self, topic: &str, handler: Arc<dyn EventHandler>) -> SubscriptionToken {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        topics
            .entry(topic.to_string())
            .or_default()
            .push(Registration { id, handler });
        SubscriptionToken {
            id,
            topic: topic.to_string(),
        }
    }

    fn remove(&self, token: &SubscriptionToken) -> bool {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        let Some(registrations) = topics.get_mut(&token.topic) else {
            return false;
        };
        let before = registrations.len();
        registrations.retain(|r| r.id != token.id);
        let removed = registrations.len() != before;
        if registrations.is_empty() {
            topics.remove(&token.topic);
        }
        removed
    }

    fn snapshot(&self, topic: &str) -> Vec<Arc<dyn EventHandler>> {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        topics
            .get(topic)
            .map(|regs| regs.iter().map(|r| Arc::clone(&r.handler)).collect())
            .unwrap_or_default()
    }
}

/// Publish/subscribe registry shared by the reconciler and all consumers.
///
/// Cheap to clone; clones share one registry.
///
/// # Example
///
/// ```ignore
/// let dispatcher = EventDispatcher::new();
/// let token = dispatcher.subscribe_fn("metrics", "MetricsPanel", |update| {
///     println!("{}", update.state.to_json());
///     Ok(())
/// });
/// dispatcher.unsubscribe(&token);
/// ```
#[derive(Clone, Default)]
pub struct EventDispatcher {
    registry: Arc<Registry>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a closure as a handler.
    pub fn subscribe_fn<F>(&self, topic: &str, name: &'static str, f: F) -> SubscriptionToken
    where
        F: Fn(&EntityUpdate) -> Result<(), DomainError> + Send + Sync + 'static,
    {
        self.subscribe(topic, Arc::new(FnHandler { name, f }))
    }

    /// Registers a handler that is removed when the returned guard drops.
    pub fn subscribe_scoped(&self, topic: &str, handler: Arc<dyn EventHandler>) -> SubscriptionGuard {
        let token = self.registry.insert(topic, handler);
        SubscriptionGuard {
            registry: Arc::downgrade(&self.registry),
            token,
        }
    }

    /// Number of handlers currently registered on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        let topics = self
            .registry
            .topics
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        topics.get(topic).map_or(0, Vec::len)
    }
}

impl EventPublisher for EventDispatcher {
    fn publish(&self, topic: &str, update: &EntityUpdate) -> DeliveryReport {
        // Lock is released before any handler runs.
        let handlers = self.registry.snapshot(topic);
        let mut report = DeliveryReport::default();

        for handler in handlers {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(update)));
            let error = match outcome {
                Ok(Ok(())) => {
                    report.delivered += 1;
                    continue;
                }
                Ok(Err(e)) => e,
                Err(_) => DomainError::new(ErrorCode::HandlerPanicked, "handler panicked"),
            };
            report.failed += 1;
            tracing::warn!(
                handler = handler.name(),
                topic = %topic,
                event_id = %update.event_id,
                error = %error,
                "Handler failed; continuing delivery"
            );
        }

        tracing::trace!(
            topic = %topic,
            delivered = report.delivered,
            failed = report.failed,
            "Published update"
        );
        report
    }
}

impl EventSubscriber for EventDispatcher {
    fn subscribe(&self, topic: &str, handler: Arc<dyn EventHandler>) -> SubscriptionToken {
        let token = self.registry.insert(topic, handler);
        tracing::debug!(token = %token, "Subscribed");
        token
    }

    fn subscribe_all(
        &self,
        topics: &[&str],
        handler: Arc<dyn EventHandler>,
    ) -> Vec<SubscriptionToken> {
        topics
            .iter()
            .map(|topic| self.subscribe(topic, Arc::clone(&handler)))
            .collect()
    }

    fn unsubscribe(&self, token: &SubscriptionToken) -> bool {
        let removed = self.registry.remove(token);
        if removed {
            tracing::debug!(token = %token, "Unsubscribed");
        }
        removed
    }
}

/// Registration tied to a consumer's lifetime.
///
/// Dropping the guard unsubscribes. If the dispatcher is already gone the
/// drop does nothing.
pub struct SubscriptionGuard {
    registry: Weak<Registry>,
    token: SubscriptionToken,
}

impl SubscriptionGuard {
    pub fn token(&self) -> &SubscriptionToken {
        &self.token
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.token);
        }
    }
}

/// Adapts a closure to [`EventHandler`].
pub struct FnHandler<F> {
    name: &'static str,
    f: F,
}

impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&EntityUpdate) -> Result<(), DomainError> + Send + Sync,
{
    fn handle(&self, update: &EntityUpdate) -> Result<(), DomainError> {
        (self.f)(update)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
