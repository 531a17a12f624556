//! Registered subscriptions and their lifecycle status.

use parking_lot::RwLock;

use crate::domain::foundation::{
    ConnectionId, OperationId, StateMachine, SubscriptionId, Timestamp, ValidationError,
};

use super::{Arguments, ChannelBinding, SubscriptionRequest};

/// Lifecycle of a registry entry.
///
/// `Pending` only exists while the registry is binding topics; listeners
/// skip entries that are not `Active`, so a half-registered entry is never
/// delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Removed,
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            (Pending, Active) | (Pending, Removed) | (Active, Removed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Pending => vec![Active, Removed],
            Active => vec![Removed],
            Removed => vec![],
        }
    }
}

/// A subscription owned by the registry.
///
/// The bus holds listeners that point at the entry; the registry alone
/// decides when it becomes `Active` or `Removed`.
#[derive(Debug)]
pub struct SubscriptionEntry {
    id: SubscriptionId,
    operation_id: OperationId,
    request: SubscriptionRequest,
    bindings: Vec<ChannelBinding>,
    status: RwLock<SubscriptionStatus>,
    created_at: Timestamp,
}

impl SubscriptionEntry {
    /// Creates a `Pending` entry.
    pub fn new(
        id: SubscriptionId,
        operation_id: OperationId,
        request: SubscriptionRequest,
        bindings: Vec<ChannelBinding>,
    ) -> Self {
        Self {
            id,
            operation_id,
            request,
            bindings,
            status: RwLock::new(SubscriptionStatus::Pending),
            created_at: Timestamp::now(),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.request.connection_id()
    }

    pub fn operation_id(&self) -> &OperationId {
        &self.operation_id
    }

    pub fn request(&self) -> &SubscriptionRequest {
        &self.request
    }

    pub fn arguments(&self) -> &Arguments {
        &self.request.arguments
    }

    pub fn bindings(&self) -> &[ChannelBinding] {
        &self.bindings
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn status(&self) -> SubscriptionStatus {
        *self.status.read()
    }

    pub fn is_active(&self) -> bool {
        self.status() == SubscriptionStatus::Active
    }

    /// Pending → Active.
    pub fn activate(&self) -> Result<(), ValidationError> {
        self.status.write().advance(SubscriptionStatus::Active)?;
        Ok(())
    }

    /// Moves to `Removed`. Returns false if the entry was already removed.
    pub fn remove(&self) -> bool {
        let mut status = self.status.write();
        status.advance(SubscriptionStatus::Removed).is_ok()
    }
}
