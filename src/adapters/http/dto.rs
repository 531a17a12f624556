//! Request and response bodies for the HTTP endpoints.

use serde::{Deserialize, Serialize};

/// Body of a successful `POST /publish/{topic}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishResponse {
    pub topic: String,
    /// Local listeners notified; 0 when fan-out happens through a broker.
    pub notified: usize,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub connections: usize,
    pub subscriptions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: "BAD_REQUEST".to_string(),
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            code: "EVENT_BUS_ERROR".to_string(),
            message: message.into(),
        }
    }
}
