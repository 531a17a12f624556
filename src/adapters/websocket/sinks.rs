//! Per-connection outbound queues.
//!
//! Each attached connection owns a bounded queue drained by its socket
//! writer task. `send` only enqueues; a full queue means the client is not
//! keeping up, so the connection is detached and its writer closes the
//! socket instead of letting the queue grow without bound.
//!
//! ```text
//! DispatchEngine ──send──▶ ConnectionSinks ──mpsc──▶ writer task ──▶ socket
//! ```

use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::domain::foundation::{ConnectionId, TransportError};
use crate::domain::protocol::ServerMessage;
use crate::ports::{CloseReason, Transport};

const DEFAULT_CAPACITY: usize = 256;

/// Item consumed by a connection's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Message(ServerMessage),
    /// Send a close frame and stop.
    Close(CloseReason),
}

/// Registry of outbound queues, keyed by connection.
pub struct ConnectionSinks {
    sinks: RwLock<HashMap<ConnectionId, mpsc::Sender<Outbound>>>,
    capacity: usize,
}

impl ConnectionSinks {
    pub fn new(capacity: usize) -> Self {
        Self {
            sinks: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Creates the queue for a connection and returns its receiving end.
    pub fn attach(&self, connection_id: ConnectionId) -> mpsc::Receiver<Outbound> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.sinks.write().insert(connection_id, tx);
        rx
    }

    /// Drops the queue. The writer sees the channel end once it is drained.
    pub fn detach(&self, connection_id: ConnectionId) -> bool {
        self.sinks.write().remove(&connection_id).is_some()
    }

    pub fn is_attached(&self, connection_id: ConnectionId) -> bool {
        self.sinks.read().contains_key(&connection_id)
    }

    pub fn connection_count(&self) -> usize {
        self.sinks.read().len()
    }
}

impl Default for ConnectionSinks {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Transport for ConnectionSinks {
    fn send(&self, connection_id: ConnectionId, message: ServerMessage) -> Result<(), TransportError> {
        let result = {
            let sinks = self.sinks.read();
            let Some(tx) = sinks.get(&connection_id) else {
                return Err(TransportError::UnknownConnection(connection_id));
            };
            tx.try_send(Outbound::Message(message))
        };

        match result {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    %connection_id,
                    capacity = self.capacity,
                    "Outbound buffer full, dropping slow connection"
                );
                self.detach(connection_id);
                Err(TransportError::Overflow(connection_id))
            }
            Err(TrySendError::Closed(_)) => {
                self.detach(connection_id);
                Err(TransportError::UnknownConnection(connection_id))
            }
        }
    }

    fn close(&self, connection_id: ConnectionId, reason: CloseReason) {
        if let Some(tx) = self.sinks.write().remove(&connection_id) {
            // A full queue still ends: the writer treats channel end as overflow
            let _ = tx.try_send(Outbound::Close(reason));
        }
    }
}

impl std::fmt::Debug for ConnectionSinks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSinks")
            .field("connections", &self.connection_count())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_enqueues_for_attached_connection() {
        let sinks = ConnectionSinks::new(4);
        let conn = ConnectionId::new();
        let mut rx = sinks.attach(conn);

        sinks.send(conn, ServerMessage::ConnectionAck).unwrap();

        assert_eq!(
            rx.recv().await,
            Some(Outbound::Message(ServerMessage::ConnectionAck))
        );
    }

    #[test]
    fn send_to_unknown_connection_fails() {
        let sinks = ConnectionSinks::default();
        let conn = ConnectionId::new();

        let err = sinks.send(conn, ServerMessage::KeepAlive).unwrap_err();
        assert!(matches!(err, TransportError::UnknownConnection(id) if id == conn));
    }

    #[tokio::test]
    async fn overflow_detaches_connection() {
        let sinks = ConnectionSinks::new(1);
        let conn = ConnectionId::new();
        let mut rx = sinks.attach(conn);

        sinks.send(conn, ServerMessage::KeepAlive).unwrap();
        let err = sinks.send(conn, ServerMessage::KeepAlive).unwrap_err();

        assert!(matches!(err, TransportError::Overflow(_)));
        assert!(!sinks.is_attached(conn));

        // Queued item still drains, then the channel ends
        assert_eq!(rx.recv().await, Some(Outbound::Message(ServerMessage::KeepAlive)));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn close_queues_close_frame_and_detaches() {
        let sinks = ConnectionSinks::new(4);
        let conn = ConnectionId::new();
        let mut rx = sinks.attach(conn);

        sinks.close(conn, CloseReason::Terminated);
        sinks.close(conn, CloseReason::Terminated);

        assert_eq!(rx.recv().await, Some(Outbound::Close(CloseReason::Terminated)));
        assert_eq!(rx.recv().await, None);
        assert_eq!(sinks.connection_count(), 0);
    }

    #[test]
    fn dropped_receiver_counts_as_unknown() {
        let sinks = ConnectionSinks::new(4);
        let conn = ConnectionId::new();
        drop(sinks.attach(conn));

        let err = sinks.send(conn, ServerMessage::KeepAlive).unwrap_err();
        assert!(matches!(err, TransportError::UnknownConnection(_)));
        assert!(!sinks.is_attached(conn));
    }
}
