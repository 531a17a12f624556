//! Transport port - Outbound side of client connections.
//!
//! The engine never blocks on a client: `send` only enqueues. How frames
//! reach the wire (WebSocket, test recorder, ...) is the adapter's concern.

use std::fmt;

use crate::domain::foundation::{ConnectionId, TransportError};
use crate::domain::protocol::ServerMessage;

/// Why the server closes a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Client sent `connection_terminate`.
    Terminated,
    /// `on_connect` rejected the handshake.
    AuthRejected(String),
    /// No `connection_init` within the configured window.
    InitTimeout,
    /// Client violated the protocol.
    ProtocolViolation(String),
    /// Outbound buffer overflowed (slow consumer).
    Overflow,
    /// Server is shutting down.
    ServerShutdown,
}

impl CloseReason {
    /// WebSocket close code for this reason.
    pub fn code(&self) -> u16 {
        match self {
            CloseReason::Terminated => 1000,
            CloseReason::ServerShutdown => 1001,
            CloseReason::Overflow => 1013,
            CloseReason::ProtocolViolation(_) => 4400,
            CloseReason::AuthRejected(_) => 4403,
            CloseReason::InitTimeout => 4408,
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Terminated => write!(f, "terminated"),
            CloseReason::AuthRejected(reason) => write!(f, "unauthorized: {}", reason),
            CloseReason::InitTimeout => write!(f, "connection initialisation timeout"),
            CloseReason::ProtocolViolation(reason) => write!(f, "protocol violation: {}", reason),
            CloseReason::Overflow => write!(f, "outbound buffer overflow"),
            CloseReason::ServerShutdown => write!(f, "server shutdown"),
        }
    }
}

/// Port for delivering messages to connected clients.
///
/// # Contract
///
/// - `send` never blocks; it fails with `UnknownConnection` once a
///   connection is gone, which callers treat as "discard".
/// - `close` is idempotent.
pub trait Transport: Send + Sync {
    /// Enqueue a message for `connection_id`.
    fn send(&self, connection_id: ConnectionId, message: ServerMessage) -> Result<(), TransportError>;

    /// Close the connection with a reason.
    fn close(&self, connection_id: ConnectionId, reason: CloseReason);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn Transport) {}

    #[test]
    fn close_codes_follow_graphql_ws_conventions() {
        assert_eq!(CloseReason::Terminated.code(), 1000);
        assert_eq!(CloseReason::AuthRejected("x".into()).code(), 4403);
        assert_eq!(CloseReason::InitTimeout.code(), 4408);
        assert_eq!(CloseReason::ProtocolViolation("x".into()).code(), 4400);
    }

    #[test]
    fn close_reason_display_includes_detail() {
        let reason = CloseReason::AuthRejected("missing token".into());
        assert_eq!(reason.to_string(), "unauthorized: missing token");
    }
}
