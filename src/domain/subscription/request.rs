//! Subscription requests and their execution context.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::domain::foundation::{AuthContext, ConnectionId};
use crate::domain::protocol::OperationPayload;

/// Subscription arguments: a JSON object keyed by argument name.
pub type Arguments = serde_json::Map<String, JsonValue>;

/// Context a subscription executes under.
///
/// Starts out as the connection's auth context; `on_subscribe` may
/// replace it (for example to attach per-subscription values).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub connection_id: ConnectionId,
    pub auth: AuthContext,
    #[serde(default)]
    pub values: JsonValue,
}

impl ExecutionContext {
    pub fn new(connection_id: ConnectionId, auth: AuthContext) -> Self {
        Self {
            connection_id,
            auth,
            values: JsonValue::Null,
        }
    }

    /// Attaches host-defined values.
    pub fn with_values(mut self, values: JsonValue) -> Self {
        self.values = values;
        self
    }
}

/// One client subscribe action, as seen by hooks and the channel resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionRequest {
    /// Logical subscription name (e.g. `commentAdded`).
    pub name: String,
    pub arguments: Arguments,
    /// The client operation, re-run by the query executor on every event.
    pub operation: OperationPayload,
    pub context: ExecutionContext,
}

impl SubscriptionRequest {
    pub fn new(name: impl Into<String>, arguments: Arguments, context: ExecutionContext) -> Self {
        Self {
            name: name.into(),
            arguments,
            operation: OperationPayload::default(),
            context,
        }
    }

    pub fn with_operation(mut self, operation: OperationPayload) -> Self {
        self.operation = operation;
        self
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.context.connection_id
    }

    /// Looks up a single argument.
    pub fn argument(&self, name: &str) -> Option<&JsonValue> {
        self.arguments.get(name)
    }
}
