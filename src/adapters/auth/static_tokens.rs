//! Static token validator.
//!
//! Implements the `SessionValidator` port from a fixed token table, loaded
//! from configuration as `user_id:token` entries. Suitable for service
//! clients and development; hosts with a real identity provider plug in
//! their own validator instead.
//!
//! # Example
//!
//! ```ignore
//! let validator = StaticTokenValidator::new()
//!     .with_user("s3cret", AuthenticatedUser::new(UserId::new("svc-1")?, None));
//!
//! let user = validator.validate("s3cret").await?;
//! ```

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

use crate::domain::foundation::{AuthError, AuthenticatedUser, UserId, ValidationError};
use crate::ports::SessionValidator;

/// Token table validator. Unknown tokens are `InvalidToken`.
///
/// Tokens stay wrapped in `SecretString` and every lookup compares against
/// all entries in constant time.
#[derive(Default)]
pub struct StaticTokenValidator {
    tokens: Vec<(SecretString, AuthenticatedUser)>,
}

impl StaticTokenValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the table from `user_id:token` entries.
    pub fn from_entries(entries: &[SecretString]) -> Result<Self, ValidationError> {
        let mut validator = Self::new();
        for entry in entries {
            let (user_id, token) = entry
                .expose_secret()
                .split_once(':')
                .ok_or_else(|| {
                    ValidationError::invalid_format("auth.static_tokens", "expected user_id:token")
                })?;
            if token.is_empty() {
                return Err(ValidationError::empty_field("auth.static_tokens.token"));
            }
            let user = AuthenticatedUser::new(UserId::new(user_id)?, None);
            validator.insert(SecretString::new(token.to_string()), user);
        }
        Ok(validator)
    }

    /// Adds a token that maps to `user`.
    pub fn with_user(mut self, token: impl Into<String>, user: AuthenticatedUser) -> Self {
        self.insert(SecretString::new(token.into()), user);
        self
    }

    /// A repeated token maps to the latest user.
    fn insert(&mut self, token: SecretString, user: AuthenticatedUser) {
        self.tokens
            .retain(|(existing, _)| !constant_time_compare(existing, token.expose_secret()));
        self.tokens.push((token, user));
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl std::fmt::Debug for StaticTokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the tokens themselves
        f.debug_struct("StaticTokenValidator")
            .field("tokens", &self.tokens.len())
            .finish()
    }
}

#[async_trait]
impl SessionValidator for StaticTokenValidator {
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        // No early exit, so timing does not depend on which entry matched
        let mut found = None;
        for (candidate, user) in &self.tokens {
            if constant_time_compare(candidate, token) {
                found = Some(user);
            }
        }
        found.cloned().ok_or(AuthError::InvalidToken)
    }
}

fn constant_time_compare(expected: &SecretString, presented: &str) -> bool {
    let expected = expected.expose_secret().as_bytes();
    let presented = presented.as_bytes();
    if expected.len() != presented.len() {
        return false;
    }
    expected.ct_eq(presented).into()
}
