//! Wire protocol exchanged with subscription clients.
//!
//! Uses the `subscriptions-transport-ws` vocabulary:
//! - Client → Server: `connection_init`, `start`, `stop`, `connection_terminate`
//! - Server → Client: `connection_ack`, `connection_error`, `ka`, `data`,
//!   `error`, `complete`
//!
//! Framing is the transport's concern; these types only fix the JSON shape.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::foundation::ErrorCode;
use super::subscription::Arguments;

// ============================================
// Client → Server Messages
// ============================================

/// All message types that can be received from a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Opens the session; `payload` is handed to `on_connect`.
    ConnectionInit {
        #[serde(default)]
        payload: JsonValue,
    },

    /// Starts a subscription under a client-chosen operation id.
    Start { id: String, payload: OperationPayload },

    /// Stops the subscription registered under `id`.
    Stop { id: String },

    /// Client is going away.
    ConnectionTerminate,
}

/// The GraphQL-style operation carried by `start`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationPayload {
    pub query: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Arguments>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
}

impl OperationPayload {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_variables(mut self, variables: Arguments) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }
}

// ============================================
// Server → Client Messages
// ============================================

/// All message types that can be sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// `connection_init` accepted.
    ConnectionAck,

    /// `connection_init` refused; the connection closes right after.
    ConnectionError { payload: ErrorPayload },

    /// Keep-alive tick.
    #[serde(rename = "ka")]
    KeepAlive,

    /// A result produced for one subscription.
    Data { id: String, payload: JsonValue },

    /// A failure scoped to one operation.
    Error { id: String, payload: ErrorPayload },

    /// The operation will produce no further results.
    Complete { id: String },
}

impl ServerMessage {
    /// Wraps an execution result the way GraphQL clients expect it.
    pub fn data(id: impl Into<String>, result: JsonValue) -> Self {
        ServerMessage::Data {
            id: id.into(),
            payload: serde_json::json!({ "data": result }),
        }
    }

    pub fn error(id: impl Into<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            id: id.into(),
            payload: ErrorPayload::new(code, message),
        }
    }

    pub fn connection_error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::ConnectionError {
            payload: ErrorPayload::new(code, message),
        }
    }

    /// Operation id this message is scoped to, if any.
    pub fn operation_id(&self) -> Option<&str> {
        match self {
            ServerMessage::Data { id, .. }
            | ServerMessage::Error { id, .. }
            | ServerMessage::Complete { id } => Some(id),
            _ => None,
        }
    }
}

/// Error body used by `error` and `connection_error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

impl ErrorPayload {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}
