//! SubscriptionServer - Wires bus, registry, dispatcher and lifecycle together.

use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::domain::event::Topic;
use crate::domain::foundation::{DomainError, EngineFault, EventBusError};
use crate::domain::subscription::{ChannelBinding, SubscriptionRequest};
use crate::ports::{
    EventBus, FaultReporter, LifecycleHooks, NoopHooks, QueryExecutor, Transport,
};

use super::dispatcher::{DispatchEngine, DispatchStats};
use super::lifecycle::ConnectionLifecycleManager;
use super::registry::SubscriptionRegistry;
use super::resolver::ChannelResolver;

/// Builder for [`SubscriptionServer`].
///
/// The bus, executor and transport are required; resolver setups, hooks
/// and the fault reporter are optional.
pub struct SubscriptionServerBuilder {
    bus: Arc<dyn EventBus>,
    executor: Arc<dyn QueryExecutor>,
    transport: Arc<dyn Transport>,
    resolver: ChannelResolver,
    hooks: Arc<dyn LifecycleHooks>,
    faults: FaultReporter,
}

impl SubscriptionServerBuilder {
    pub fn with_resolver(mut self, resolver: ChannelResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Registers a setup function on the resolver.
    pub fn with_setup<F>(mut self, name: impl Into<String>, setup: F) -> Self
    where
        F: Fn(&SubscriptionRequest) -> Result<Vec<ChannelBinding>, DomainError>
            + Send
            + Sync
            + 'static,
    {
        self.resolver.register_setup(name, setup);
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn LifecycleHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Shares a fault reporter, e.g. the one an event bus adapter reports to.
    pub fn with_fault_reporter(mut self, faults: FaultReporter) -> Self {
        self.faults = faults;
        self
    }

    pub fn build(self) -> SubscriptionServer {
        let dispatcher = Arc::new(DispatchEngine::new(
            Arc::clone(&self.executor),
            Arc::clone(&self.transport),
        ));
        let registry = Arc::new(SubscriptionRegistry::new(
            Arc::clone(&self.bus),
            self.resolver,
            dispatcher,
        ));
        let lifecycle = Arc::new(ConnectionLifecycleManager::new(
            Arc::clone(&registry),
            self.executor,
            self.transport,
            self.hooks,
        ));

        SubscriptionServer {
            bus: self.bus,
            registry,
            lifecycle,
            faults: self.faults,
        }
    }
}

/// Entry point for hosts: publish events, drive connections, observe faults.
///
/// # Example
///
/// ```ignore
/// let server = SubscriptionServer::builder(bus, executor, transport)
///     .with_setup("commentAdded", |_| {
///         Ok(vec![ChannelBinding::field_equals(
///             Topic::new("newCommentsChannel")?,
///             "repoName",
///             "repoFullName",
///         )])
///     })
///     .build();
///
/// server.publish("newCommentsChannel", json!({"repoName": "apollostack/GitHunt"})).await?;
/// ```
pub struct SubscriptionServer {
    bus: Arc<dyn EventBus>,
    registry: Arc<SubscriptionRegistry>,
    lifecycle: Arc<ConnectionLifecycleManager>,
    faults: FaultReporter,
}

impl SubscriptionServer {
    pub fn builder(
        bus: Arc<dyn EventBus>,
        executor: Arc<dyn QueryExecutor>,
        transport: Arc<dyn Transport>,
    ) -> SubscriptionServerBuilder {
        SubscriptionServerBuilder {
            bus,
            executor,
            transport,
            resolver: ChannelResolver::new(),
            hooks: Arc::new(NoopHooks),
            faults: FaultReporter::default(),
        }
    }

    /// Publishes `payload` on `topic`.
    ///
    /// Returns the number of local listeners notified. Filter and executor
    /// failures never surface here; only bus failures do.
    pub async fn publish(&self, topic: &str, payload: JsonValue) -> Result<usize, EventBusError> {
        let topic = Topic::new(topic)
            .map_err(|e| EventBusError::Serialization(e.to_string()))?;
        self.bus.publish(&topic, payload).await
    }

    pub fn lifecycle(&self) -> &Arc<ConnectionLifecycleManager> {
        &self.lifecycle
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    pub fn bus(&self) -> &Arc<dyn EventBus> {
        &self.bus
    }

    /// Observe faults that have no owning connection.
    pub fn faults(&self) -> broadcast::Receiver<EngineFault> {
        self.faults.subscribe()
    }

    pub fn fault_reporter(&self) -> &FaultReporter {
        &self.faults
    }

    pub fn dispatch_stats(&self) -> DispatchStats {
        self.registry.dispatcher().stats()
    }
}

impl std::fmt::Debug for SubscriptionServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionServer")
            .field("registry", &self.registry)
            .field("connections", &self.lifecycle.connection_count())
            .finish_non_exhaustive()
    }
}
