//! Foundation module - Shared domain primitives.
//!
//! Identifiers, timestamps, the state machine trait and the error
//! vocabulary used by every other layer.

mod auth;
mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use auth::{AuthContext, AuthError, AuthenticatedUser};
pub use errors::{
    AuthRejected, DispatchFault, DomainError, EngineFault, ErrorCode, EventBusError,
    ProtocolError, RegistryError, ResolutionError, SubscriptionRejected, TransportError,
    ValidationError,
};
pub use ids::{ConnectionId, EventId, OperationId, SubscriptionId, UserId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
