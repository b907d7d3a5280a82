//! Bounded recency set of event identities.
//!
//! ## Eviction
//!
//! The window holds at most `max_size` identities. Inserting past that bound
//! evicts the oldest `eviction_batch` entries in one pass instead of one entry
//! per insert, so the effective dedup horizon oscillates between
//! `max_size - eviction_batch` and `max_size`. Callers must not rely on an
//! exact horizon.

use std::collections::{HashSet, VecDeque};

use crate::domain::foundation::ValidationError;
use crate::domain::stream::EventIdentity;

/// Default maximum number of remembered identities.
pub const DEFAULT_WINDOW_SIZE: usize = 1000;

/// Default number of identities evicted when the window overflows.
pub const DEFAULT_EVICTION_BATCH: usize = 100;

/// Insertion-ordered, bounded set of recently seen identities.
#[derive(Debug, Clone)]
pub struct DedupWindow {
    seen: HashSet<EventIdentity>,
    order: VecDeque<EventIdentity>,
    max_size: usize,
    eviction_batch: usize,
}

impl DedupWindow {
    /// Creates a window with explicit bounds.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` unless `1 <= eviction_batch <= max_size`.
    pub fn new(max_size: usize, eviction_batch: usize) -> Result<Self, ValidationError> {
        if max_size == 0 {
            return Err(ValidationError::invalid_format(
                "dedup.window_size",
                "must be at least 1",
            ));
        }
        if eviction_batch == 0 || eviction_batch > max_size {
            return Err(ValidationError::invalid_format(
                "dedup.eviction_batch",
                format!("must be between 1 and {}", max_size),
            ));
        }
        Ok(Self {
            seen: HashSet::with_capacity(max_size + 1),
            order: VecDeque::with_capacity(max_size + 1),
            max_size,
            eviction_batch,
        })
    }

    /// Returns `true` and remembers `identity` if it is unseen;
    /// returns `false` for a duplicate.
    pub fn should_process(&mut self, identity: &EventIdentity) -> bool {
        if self.seen.contains(identity) {
            return false;
        }
        self.seen.insert(identity.clone());
        self.order.push_back(identity.clone());

        if self.order.len() > self.max_size {
            self.evict_oldest();
        }
        true
    }

    /// Whether `identity` is currently remembered.
    pub fn contains(&self, identity: &EventIdentity) -> bool {
        self.seen.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn eviction_batch(&self) -> usize {
        self.eviction_batch
    }

    fn evict_oldest(&mut self) {
        let count = self.eviction_batch.min(self.order.len());
        for evicted in self.order.drain(..count) {
            self.seen.remove(&evicted);
        }
    }
}

impl Default for DedupWindow {
    fn default() -> Self {
        Self {
            seen: HashSet::with_capacity(DEFAULT_WINDOW_SIZE + 1),
            order: VecDeque::with_capacity(DEFAULT_WINDOW_SIZE + 1),
            max_size: DEFAULT_WINDOW_SIZE,
            eviction_batch: DEFAULT_EVICTION_BATCH,
        }
    }
}
