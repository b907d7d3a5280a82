//! Foundation module - Shared domain primitives.
//!
//! Error types, timestamps and the state machine trait used by every
//! other part of the ingestion pipeline.

mod errors;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
