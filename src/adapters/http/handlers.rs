//! HTTP handlers for publishing and health.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value as JsonValue;

use crate::adapters::websocket::WebSocketState;
use crate::domain::foundation::EventBusError;

use super::dto::{ErrorResponse, HealthResponse, PublishResponse};

#[derive(Debug)]
pub enum PublishApiError {
    BadRequest(String),
    Unavailable(String),
}

impl From<EventBusError> for PublishApiError {
    fn from(err: EventBusError) -> Self {
        match err {
            EventBusError::Serialization(msg) => PublishApiError::BadRequest(msg),
            EventBusError::Unavailable(msg) => PublishApiError::Unavailable(msg),
        }
    }
}

impl IntoResponse for PublishApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            PublishApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorResponse::bad_request(msg))
            }
            PublishApiError::Unavailable(msg) => {
                tracing::error!("Publish failed: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorResponse::unavailable("Event bus unavailable"),
                )
            }
        };

        (status, Json(error)).into_response()
    }
}

/// POST /publish/{topic} - Publish the JSON body on a topic
pub async fn publish(
    State(state): State<WebSocketState>,
    Path(topic): Path<String>,
    Json(payload): Json<JsonValue>,
) -> Result<Json<PublishResponse>, PublishApiError> {
    let notified = state.server.publish(&topic, payload).await?;
    tracing::debug!(%topic, notified, "Published over HTTP");

    Ok(Json(PublishResponse { topic, notified }))
}

/// GET /health - Liveness plus connection and subscription counts
pub async fn health(State(state): State<WebSocketState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        connections: state.server.lifecycle().connection_count(),
        subscriptions: state.server.registry().subscription_count(),
    })
}
