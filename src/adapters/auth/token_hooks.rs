//! Lifecycle hooks that authenticate `connection_init` by token.
//!
//! Reads the token from the init payload (`authToken`, with an optional
//! `Bearer ` prefix) and resolves it through a `SessionValidator`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::domain::foundation::{AuthContext, AuthRejected, ConnectionId, SubscriptionId};
use crate::ports::{LifecycleHooks, SessionValidator};

/// Init payload key carrying the token.
pub const AUTH_TOKEN_PARAM: &str = "authToken";

pub struct TokenAuthHooks {
    validator: Arc<dyn SessionValidator>,
    required: bool,
}

impl TokenAuthHooks {
    /// With `required`, connections without a token are rejected; otherwise
    /// they proceed anonymously. A token that is present must validate.
    pub fn new(validator: Arc<dyn SessionValidator>, required: bool) -> Self {
        Self {
            validator,
            required,
        }
    }
}

fn token_from(params: &JsonValue) -> Option<&str> {
    let raw = params.get(AUTH_TOKEN_PARAM)?.as_str()?.trim();
    let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl LifecycleHooks for TokenAuthHooks {
    async fn on_connect(
        &self,
        connection_id: ConnectionId,
        params: &JsonValue,
    ) -> Result<AuthContext, AuthRejected> {
        let Some(token) = token_from(params) else {
            if self.required {
                return Err(AuthRejected::new("missing auth token"));
            }
            return Ok(AuthContext::Anonymous);
        };

        match self.validator.validate(token).await {
            Ok(user) => {
                tracing::debug!(%connection_id, user_id = %user.id, "Token validated");
                Ok(AuthContext::User(user))
            }
            Err(e) => {
                if e.is_transient() {
                    tracing::warn!(%connection_id, error = %e, "Token validation unavailable");
                }
                Err(AuthRejected::new(e.to_string()))
            }
        }
    }

    fn on_unsubscribe(&self, connection_id: ConnectionId, subscription_id: SubscriptionId) {
        tracing::trace!(%connection_id, %subscription_id, "Unsubscribed");
    }

    fn on_disconnect(&self, connection_id: ConnectionId) {
        tracing::trace!(%connection_id, "Disconnected");
    }
}
