//! Event bus configuration

use serde::Deserialize;

use super::error::ValidationError;
use super::redis::RedisConfig;

/// Which event bus implementation to run
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventBusBackend {
    /// Single process, no broker
    #[default]
    Memory,
    /// Fan-out across processes through Redis pub/sub
    Redis,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventBusConfig {
    #[serde(default)]
    pub backend: EventBusBackend,

    /// Required when `backend = redis`
    #[serde(default)]
    pub redis: Option<RedisConfig>,
}

impl EventBusConfig {
    /// Validate event bus configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        match (self.backend, &self.redis) {
            (EventBusBackend::Memory, _) => Ok(()),
            (EventBusBackend::Redis, Some(redis)) => redis.validate(),
            (EventBusBackend::Redis, None) => {
                Err(ValidationError::MissingRequired("EVENT_BUS__REDIS__URL"))
            }
        }
    }
}
