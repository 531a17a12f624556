//! Client connections and their handshake phase.
//!
//! ```text
//! AwaitingInit ──connection_init──▶ Authenticating ──on_connect ok──▶ Ready
//!      │                                  │
//!      │                                  └──on_connect err──▶ Rejected
//!      └───────────────── any phase ──disconnect──▶ Closed
//! ```

use std::collections::HashMap;

use crate::domain::foundation::{
    AuthContext, ConnectionId, OperationId, ProtocolError, StateMachine, SubscriptionId,
    Timestamp, ValidationError,
};

/// Handshake phase of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    AwaitingInit,
    Authenticating,
    Ready,
    Rejected,
    Closed,
}

impl StateMachine for ConnectionPhase {
    fn can_transition_to(&self, target: &Self) -> bool {
        self.valid_transitions().contains(target)
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ConnectionPhase::*;
        match self {
            AwaitingInit => vec![Authenticating, Closed],
            Authenticating => vec![Ready, Rejected, Closed],
            Ready => vec![Closed],
            Rejected => vec![Closed],
            Closed => vec![],
        }
    }
}

/// Server-side state for one client connection.
///
/// The auth context is set once, when `on_connect` resolves. Operations map
/// the client's ids onto registry subscription ids.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    phase: ConnectionPhase,
    auth: Option<AuthContext>,
    operations: HashMap<OperationId, SubscriptionId>,
    opened_at: Timestamp,
}

impl Connection {
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            phase: ConnectionPhase::AwaitingInit,
            auth: None,
            operations: HashMap::new(),
            opened_at: Timestamp::now(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn auth(&self) -> Option<&AuthContext> {
        self.auth.as_ref()
    }

    pub fn opened_at(&self) -> Timestamp {
        self.opened_at
    }

    /// AwaitingInit → Authenticating. A second init is a protocol error.
    pub fn begin_authentication(&mut self) -> Result<(), ProtocolError> {
        self.phase
            .advance(ConnectionPhase::Authenticating)
            .map(|_| ())
            .map_err(|_| ProtocolError::DuplicateInit)
    }

    /// Authenticating → Ready, storing the auth context.
    pub fn accept(&mut self, auth: AuthContext) -> Result<(), ValidationError> {
        self.phase.advance(ConnectionPhase::Ready)?;
        self.auth = Some(auth);
        Ok(())
    }

    /// Authenticating → Rejected.
    pub fn reject(&mut self) -> Result<(), ValidationError> {
        self.phase.advance(ConnectionPhase::Rejected)?;
        Ok(())
    }

    /// Moves to `Closed` and forgets every tracked operation.
    ///
    /// Returns `false` when the connection was already closed.
    pub fn close(&mut self) -> bool {
        if self.phase.advance(ConnectionPhase::Closed).is_err() {
            return false;
        }
        self.operations.clear();
        true
    }

    /// Tracks an operation, returning the subscription it replaces (if any).
    pub fn track(&mut self, operation: OperationId, subscription: SubscriptionId) -> Option<SubscriptionId> {
        self.operations.insert(operation, subscription)
    }

    /// Stops tracking an operation.
    pub fn untrack(&mut self, operation: &OperationId) -> Option<SubscriptionId> {
        self.operations.remove(operation)
    }

    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{AuthenticatedUser, UserId};

    fn op(id: &str) -> OperationId {
        OperationId::new(id).unwrap()
    }

    #[test]
    fn new_connection_awaits_init() {
        let conn = Connection::new(ConnectionId::new());
        assert_eq!(conn.phase(), ConnectionPhase::AwaitingInit);
        assert!(conn.auth().is_none());
    }

    #[test]
    fn handshake_success_sets_auth() {
        let mut conn = Connection::new(ConnectionId::new());
        conn.begin_authentication().unwrap();
        let user = AuthenticatedUser::new(UserId::new("u-1").unwrap(), None);
        conn.accept(AuthContext::User(user)).unwrap();

        assert_eq!(conn.phase(), ConnectionPhase::Ready);
        assert!(conn.auth().unwrap().is_authenticated());
    }

    #[test]
    fn second_init_is_protocol_error() {
        let mut conn = Connection::new(ConnectionId::new());
        conn.begin_authentication().unwrap();
        assert!(matches!(
            conn.begin_authentication(),
            Err(ProtocolError::DuplicateInit)
        ));
    }

    #[test]
    fn rejected_connection_cannot_become_ready() {
        let mut conn = Connection::new(ConnectionId::new());
        conn.begin_authentication().unwrap();
        conn.reject().unwrap();
        assert!(conn.accept(AuthContext::Anonymous).is_err());
        assert!(conn.auth().is_none());
    }

    #[test]
    fn close_forgets_operations_once() {
        let mut conn = Connection::new(ConnectionId::new());
        conn.track(op("1"), SubscriptionId::from_raw(10));
        conn.track(op("2"), SubscriptionId::from_raw(11));

        assert!(conn.close());
        assert_eq!(conn.phase(), ConnectionPhase::Closed);
        assert_eq!(conn.operation_count(), 0);
        assert!(!conn.close());
    }

    #[test]
    fn track_returns_replaced_subscription() {
        let mut conn = Connection::new(ConnectionId::new());
        assert_eq!(conn.track(op("1"), SubscriptionId::from_raw(1)), None);
        assert_eq!(
            conn.track(op("1"), SubscriptionId::from_raw(2)),
            Some(SubscriptionId::from_raw(1))
        );
        assert_eq!(conn.untrack(&op("1")), Some(SubscriptionId::from_raw(2)));
        assert_eq!(conn.untrack(&op("1")), None);
    }
}
