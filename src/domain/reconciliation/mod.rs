//! Reconciliation primitives: duplicate suppression and entity snapshots.

mod dedup_window;
mod entity_state;
mod update;

pub use dedup_window::{DedupWindow, DEFAULT_EVICTION_BATCH, DEFAULT_WINDOW_SIZE};
pub use entity_state::{shallow_merge, EntityKey, EntityState};
pub use update::EntityUpdate;
