//! Authentication configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;

/// Connection authentication settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Reject `connection_init` without a valid `authToken`
    #[serde(default)]
    pub required: bool,

    /// `user_id:token` entries, comma-separated in the environment
    #[serde(default)]
    pub static_tokens: Vec<SecretString>,
}

impl AuthConfig {
    /// Whether connections go through token authentication at all.
    pub fn is_enabled(&self) -> bool {
        self.required || !self.static_tokens.is_empty()
    }

    /// Validate authentication configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.required && self.static_tokens.is_empty() {
            return Err(ValidationError::NoTokensConfigured);
        }
        for (index, entry) in self.static_tokens.iter().enumerate() {
            match entry.expose_secret().split_once(':') {
                Some((user, token)) if !user.is_empty() && !token.is_empty() => {}
                // Report the position, never the secret
                _ => return Err(ValidationError::InvalidStaticToken(format!("entry {}", index))),
            }
        }
        Ok(())
    }
}
