//! State machine trait for lifecycle enums.
//!
//! Subscription status and connection phase both move through a fixed set of
//! transitions; this trait keeps the validation in one place.

use super::ValidationError;

/// Trait for status enums that represent state machines.
///
/// Implementors define valid transitions and get validated transition
/// methods for free.
///
/// # Example
///
/// ```ignore
/// let next = status.transition_to(SubscriptionStatus::Active)?;
/// status.advance(SubscriptionStatus::Removed)?;
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Validates a transition, returning the target on success.
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

    /// Transitions in place, returning the previous state.
    fn advance(&mut self, target: Self) -> Result<Self, ValidationError> {
        let next = self.transition_to(target)?;
        Ok(std::mem::replace(self, next))
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}
