//! LifecycleHooks port - Host extension point for connection and subscription events.
//!
//! Every hook has a default implementation, so hosts override only what they
//! need and call sites stay total. The defaults behave as identity: no auth
//! gate, no veto, no side effects.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::domain::foundation::{
    AuthContext, AuthRejected, ConnectionId, SubscriptionId, SubscriptionRejected,
};
use crate::domain::subscription::{ExecutionContext, SubscriptionRequest};

/// Host callbacks invoked by the connection lifecycle manager.
///
/// # Ordering
///
/// 1. `on_connect` - on `connection_init`; may suspend. No subscription of
///    the connection is accepted until it resolves; an error closes the
///    connection.
/// 2. `on_subscribe` - per `start`, after connect resolved and before channel
///    resolution; an error vetoes the subscription.
/// 3. `on_unsubscribe` - alongside every unregister; observational.
/// 4. `on_disconnect` - after all subscriptions of the connection are gone;
///    observational.
///
/// # Example
///
/// ```ignore
/// struct RequireToken;
///
/// #[async_trait]
/// impl LifecycleHooks for RequireToken {
///     async fn on_connect(&self, _: ConnectionId, params: &JsonValue)
///         -> Result<AuthContext, AuthRejected>
///     {
///         params.get("authToken")
///             .map(|_| AuthContext::Anonymous)
///             .ok_or_else(|| AuthRejected::new("missing auth token"))
///     }
/// }
/// ```
#[async_trait]
pub trait LifecycleHooks: Send + Sync {
    /// Authenticate the connection from its `connection_init` payload.
    async fn on_connect(
        &self,
        _connection_id: ConnectionId,
        _params: &JsonValue,
    ) -> Result<AuthContext, AuthRejected> {
        Ok(AuthContext::Anonymous)
    }

    /// Adjust the execution context of a subscription, or veto it.
    async fn on_subscribe(
        &self,
        request: &SubscriptionRequest,
    ) -> Result<ExecutionContext, SubscriptionRejected> {
        Ok(request.context.clone())
    }

    /// A subscription was unregistered.
    fn on_unsubscribe(&self, _connection_id: ConnectionId, _subscription_id: SubscriptionId) {}

    /// A connection was torn down.
    fn on_disconnect(&self, _connection_id: ConnectionId) {}
}

/// Hooks with every default in place.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl LifecycleHooks for NoopHooks {}
