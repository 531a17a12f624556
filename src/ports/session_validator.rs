//! Session validation port for connection tokens.
//!
//! Used by the token authentication hooks to turn the `authToken` found in
//! `connection_init` params into an authenticated user. Provider-agnostic:
//! a static token table ships with the crate, JWT/OIDC validators can be
//! plugged in by the host.

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedUser};

/// Validates access tokens and extracts user identity.
///
/// # Contract
///
/// Implementations must:
/// - Return `AuthError::InvalidToken` for unknown, malformed or revoked tokens
/// - Return `AuthError::ServiceUnavailable` for transient errors
#[async_trait]
pub trait SessionValidator: Send + Sync {
    /// Validate a raw token (without any "Bearer " prefix).
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}
