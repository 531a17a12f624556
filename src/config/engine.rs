//! Subscription engine configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

const MAX_INIT_TIMEOUT_SECS: u64 = 300;

/// WebSocket endpoint and per-connection limits
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Route serving the WebSocket upgrade
    #[serde(default = "default_path")]
    pub path: String,

    /// Seconds between `ka` messages; 0 disables keep-alive
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    /// Seconds a client may take to send `connection_init`
    #[serde(default = "default_init_timeout")]
    pub init_timeout_secs: u64,

    /// Outbound messages queued per connection before it is dropped
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl EngineConfig {
    pub fn keep_alive(&self) -> Option<Duration> {
        (self.keep_alive_secs > 0).then(|| Duration::from_secs(self.keep_alive_secs))
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_secs(self.init_timeout_secs)
    }

    /// Validate engine configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.path.starts_with('/') {
            return Err(ValidationError::InvalidPath);
        }
        if self.init_timeout_secs == 0 || self.init_timeout_secs > MAX_INIT_TIMEOUT_SECS {
            return Err(ValidationError::InvalidTimeout("engine.init_timeout_secs"));
        }
        if self.outbound_buffer == 0 {
            return Err(ValidationError::InvalidBufferSize);
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            keep_alive_secs: default_keep_alive(),
            init_timeout_secs: default_init_timeout(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

fn default_path() -> String {
    "/subscriptions".to_string()
}

fn default_keep_alive() -> u64 {
    30
}

fn default_init_timeout() -> u64 {
    10
}

fn default_outbound_buffer() -> usize {
    256
}
