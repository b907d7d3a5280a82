//! EventPublisher port - Interface for delivering reconciled updates.
//!
//! The reconciler publishes through this port without knowing how many
//! consumers exist or what they do.

use crate::domain::reconciliation::EntityUpdate;

/// Outcome of one `publish` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Handlers that returned `Ok`.
    pub delivered: usize,
    /// Handlers that returned `Err` or panicked.
    pub failed: usize,
}

impl DeliveryReport {
    /// Total handler invocations.
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed
    }
}

/// Port for publishing entity updates.
///
/// Implementations must:
/// - deliver synchronously to every handler registered when the call starts
/// - preserve registration order per topic
/// - isolate handler failures (one failure never stops the rest)
/// - never buffer or replay: late subscribers miss earlier updates
pub trait EventPublisher: Send + Sync {
    fn publish(&self, topic: &str, update: &EntityUpdate) -> DeliveryReport;
}
