//! Authentication types for the domain layer.
//!
//! `AuthContext` is what a connection carries after its `connection_init`
//! handshake resolves. It is set exactly once and handed to every
//! subscription started on that connection.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::UserId;

/// Authenticated user resolved from a connection token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// The unique user identifier from the token validator.
    pub id: UserId,

    /// Display name if the validator knows one.
    pub display_name: Option<String>,

    /// Free-form claims forwarded to filters and the query executor.
    #[serde(default)]
    pub claims: serde_json::Value,
}

impl AuthenticatedUser {
    /// Creates a new authenticated user without extra claims.
    pub fn new(id: UserId, display_name: Option<String>) -> Self {
        Self {
            id,
            display_name,
            claims: serde_json::Value::Null,
        }
    }

    /// Attaches claims.
    pub fn with_claims(mut self, claims: serde_json::Value) -> Self {
        self.claims = claims;
        self
    }
}

/// Authentication state attached to a connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthContext {
    /// No authentication gate is configured.
    #[default]
    Anonymous,

    /// The connection presented a valid token.
    User(AuthenticatedUser),
}

impl AuthContext {
    /// Returns the authenticated user, if any.
    pub fn user(&self) -> Option<&AuthenticatedUser> {
        match self {
            AuthContext::Anonymous => None,
            AuthContext::User(user) => Some(user),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }
}

/// Authentication errors that can occur during token validation.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The connection params carried no token.
    #[error("Missing auth token")]
    MissingToken,

    /// The token is unknown, malformed or revoked.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// The authentication service is unavailable (network, config, etc.).
    #[error("Auth service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AuthError {
    /// Creates a service unavailable error with a message.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Returns true if this is a transient error that may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::ServiceUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn anonymous_context_has_no_user() {
        let ctx = AuthContext::default();
        assert!(!ctx.is_authenticated());
        assert!(ctx.user().is_none());
    }

    #[test]
    fn user_context_exposes_user() {
        let user = AuthenticatedUser::new(UserId::new("u-1").unwrap(), Some("Ada".into()))
            .with_claims(json!({"role": "admin"}));
        let ctx = AuthContext::User(user.clone());
        assert_eq!(ctx.user(), Some(&user));
    }

    #[test]
    fn auth_context_serializes_with_kind_tag() {
        let ctx = AuthContext::User(AuthenticatedUser::new(UserId::new("u-1").unwrap(), None));
        let value = serde_json::to_value(&ctx).unwrap();
        assert_eq!(value["kind"], "user");
        assert_eq!(value["id"], "u-1");
    }

    #[test]
    fn only_service_unavailable_is_transient() {
        assert!(AuthError::service_unavailable("down").is_transient());
        assert!(!AuthError::InvalidToken.is_transient());
        assert!(!AuthError::MissingToken.is_transient());
    }
}
