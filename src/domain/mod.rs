//! Domain layer containing the pipeline's pure types and algorithms.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (errors, timestamps, state machine trait)
//! - `stream` - Raw messages, event identities and the typed event union
//! - `connection` - Connection lifecycle and reconnect backoff
//! - `reconciliation` - Dedup window, entity snapshots, shallow merge

pub mod connection;
pub mod foundation;
pub mod reconciliation;
pub mod stream;
