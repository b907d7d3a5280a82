//! State machine trait for lifecycle enums.
//!
//! Gives lifecycle enums (the connection lifecycle in particular) a single
//! place to declare their legal edges, so illegal transitions are rejected
//! the same way everywhere.

use super::ValidationError;

/// Trait for enums that represent state machines.
///
/// Implementors list their legal edges; `transition_to` validates against them.
///
/// ```ignore
/// let next = ConnectionState::Connecting.transition_to(ConnectionState::Connected)?;
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "state_transition",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
        }
    }
}
