//! Error types shared across the engine.
//!
//! `DomainError` is what host-supplied callbacks (setup functions, filters,
//! the query executor) return. The remaining enums name the engine's own
//! failure kinds; each maps onto a stable [`ErrorCode`] that is sent to
//! clients in `error` / `connection_error` payloads.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use thiserror::Error;

use super::{ConnectionId, OperationId, SubscriptionId};

/// Errors that occur during value object construction.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField { field: field.into() }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Error codes reported to clients and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ValidationFailed,
    ResolutionFailed,
    SubscriptionRejected,
    AuthRejected,
    DispatchFault,
    ExecutionFailed,
    ConnectionClosed,
    ProtocolError,
    EventBusError,
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::ResolutionFailed => "RESOLUTION_FAILED",
            ErrorCode::SubscriptionRejected => "SUBSCRIPTION_REJECTED",
            ErrorCode::AuthRejected => "AUTH_REJECTED",
            ErrorCode::DispatchFault => "DISPATCH_FAULT",
            ErrorCode::ExecutionFailed => "EXECUTION_FAILED",
            ErrorCode::ConnectionClosed => "CONNECTION_CLOSED",
            ErrorCode::ProtocolError => "PROTOCOL_ERROR",
            ErrorCode::EventBusError => "EVENT_BUS_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", s)
    }
}

/// Failure returned by host-supplied callbacks.
#[derive(Debug, Clone)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl DomainError {
    /// Creates a new domain error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Shorthand for an `EXECUTION_FAILED` error.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExecutionFailed, message)
    }

    /// Adds a detail to the error.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for DomainError {}

impl From<ValidationError> for DomainError {
    fn from(err: ValidationError) -> Self {
        DomainError::new(ErrorCode::ValidationFailed, err.to_string())
    }
}

/// Channel resolution failed while registering a subscription.
///
/// Registration is aborted and no binding is left behind.
#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
    #[error("setup for '{name}' failed: {source}")]
    SetupFailed { name: String, source: DomainError },

    #[error("setup for '{name}' binds topic '{topic}' more than once")]
    DuplicateTopic { name: String, topic: String },

    #[error("event bus refused binding on '{topic}': {source}")]
    BindFailed { topic: String, source: EventBusError },
}

impl ResolutionError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::ResolutionFailed
    }
}

/// A subscription was vetoed before it reached the registry.
#[derive(Debug, Clone, Error)]
#[error("subscription rejected: {reason}")]
pub struct SubscriptionRejected {
    pub reason: String,
}

impl SubscriptionRejected {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        ErrorCode::SubscriptionRejected
    }
}

/// The connection-init handshake was refused.
#[derive(Debug, Clone, Error)]
#[error("authentication rejected: {reason}")]
pub struct AuthRejected {
    pub reason: String,
}

impl AuthRejected {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        ErrorCode::AuthRejected
    }
}

/// Failure isolated to one subscription during an otherwise successful dispatch.
#[derive(Debug, Clone, Error)]
pub enum DispatchFault {
    #[error("filter on topic '{topic}' failed: {source}")]
    FilterFailed { topic: String, source: DomainError },

    #[error("result execution failed: {source}")]
    ExecutionFailed { source: DomainError },
}

impl DispatchFault {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::DispatchFault
    }
}

/// Errors from `SubscriptionRegistry` operations.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("connection {0} is closed")]
    ConnectionClosed(ConnectionId),

    #[error(transparent)]
    InvalidState(#[from] ValidationError),
}

impl RegistryError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RegistryError::Resolution(e) => e.code(),
            RegistryError::ConnectionClosed(_) => ErrorCode::ConnectionClosed,
            RegistryError::InvalidState(_) => ErrorCode::InternalError,
        }
    }
}

/// Errors raised by an event bus implementation.
#[derive(Debug, Clone, Error)]
pub enum EventBusError {
    /// Backing broker unreachable or returned an error.
    #[error("event bus unavailable: {0}")]
    Unavailable(String),

    /// Payload could not be encoded or decoded.
    #[error("event serialization failed: {0}")]
    Serialization(String),
}

impl EventBusError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::EventBusError
    }
}

/// Errors raised by a transport when enqueuing outbound messages.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("connection {0} is not attached to the transport")]
    UnknownConnection(ConnectionId),

    #[error("outbound buffer for connection {0} overflowed")]
    Overflow(ConnectionId),
}

/// Protocol-level problems with a client message.
#[derive(Debug, Clone, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("operation {0} received before connection_init")]
    NotInitialised(OperationId),

    #[error("connection_init already received")]
    DuplicateInit,
}

impl ProtocolError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::ProtocolError
    }
}

/// A fault with no attributable connection, surfaced to the host process.
#[derive(Debug, Clone, Error)]
#[error("[{source_name}] {message}")]
pub struct EngineFault {
    pub source_name: &'static str,
    pub message: String,
    pub subscription_id: Option<SubscriptionId>,
}

impl EngineFault {
    pub fn new(source_name: &'static str, message: impl Into<String>) -> Self {
        Self {
            source_name,
            message: message.into(),
            subscription_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_error_displays_code_and_message() {
        let err = DomainError::new(ErrorCode::ExecutionFailed, "resolver exploded");
        assert_eq!(format!("{}", err), "[EXECUTION_FAILED] resolver exploded");
    }

    #[test]
    fn domain_error_with_detail_adds_detail() {
        let err = DomainError::execution("boom").with_detail("field", "repoFullName");
        assert_eq!(err.details.get("field"), Some(&"repoFullName".to_string()));
    }

    #[test]
    fn resolution_error_wraps_setup_failure() {
        let err = ResolutionError::SetupFailed {
            name: "commentAdded".to_string(),
            source: DomainError::execution("no repo"),
        };
        assert_eq!(err.code(), ErrorCode::ResolutionFailed);
        assert!(err.to_string().contains("commentAdded"));
    }

    #[test]
    fn registry_error_code_follows_variant() {
        let closed = RegistryError::ConnectionClosed(ConnectionId::new());
        assert_eq!(closed.code(), ErrorCode::ConnectionClosed);

        let resolution: RegistryError = ResolutionError::SetupFailed {
            name: "x".to_string(),
            source: DomainError::execution("y"),
        }
        .into();
        assert_eq!(resolution.code(), ErrorCode::ResolutionFailed);
    }

    #[test]
    fn dispatch_fault_names_topic() {
        let fault = DispatchFault::FilterFailed {
            topic: "newCommentsChannel".to_string(),
            source: DomainError::execution("missing field"),
        };
        assert_eq!(fault.code(), ErrorCode::DispatchFault);
        assert!(fault.to_string().contains("newCommentsChannel"));
    }

    #[test]
    fn error_code_display_formats_correctly() {
        assert_eq!(ErrorCode::AuthRejected.to_string(), "AUTH_REJECTED");
        assert_eq!(ErrorCode::ProtocolError.to_string(), "PROTOCOL_ERROR");
    }

    #[test]
    fn validation_error_converts_to_domain_error() {
        let err: DomainError = ValidationError::empty_field("id").into();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }
}
