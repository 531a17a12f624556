use std::error::Error;
use std::sync::Arc;

use tokio::signal;
use tracing_subscriber::EnvFilter;

use subscriptions_engine::adapters::http;
use subscriptions_engine::adapters::{
    ConnectionSinks, InMemoryEventBus, PassthroughExecutor, RedisEventBus, StaticTokenValidator,
    TokenAuthHooks, WebSocketSettings, WebSocketState,
};
use subscriptions_engine::application::SubscriptionServer;
use subscriptions_engine::config::{
    AppConfig, AuthConfig, EventBusBackend, EventBusConfig, LogFormat, ServerConfig,
    ValidationError,
};
use subscriptions_engine::ports::{EventBus, FaultReporter, LifecycleHooks, NoopHooks};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::load()?;
    config.validate()?;
    init_tracing(&config.server);

    let faults = FaultReporter::default();
    let bus = build_event_bus(&config.event_bus, &faults).await?;
    let hooks = build_hooks(&config.auth)?;
    let sinks = Arc::new(ConnectionSinks::new(config.engine.outbound_buffer));

    let server = SubscriptionServer::builder(bus, Arc::new(PassthroughExecutor::new()), sinks.clone())
        .with_hooks(hooks)
        .with_fault_reporter(faults)
        .build();

    let settings = WebSocketSettings {
        keep_alive: config.engine.keep_alive(),
        init_timeout: config.engine.init_timeout(),
    };
    let state = WebSocketState::new(Arc::new(server), sinks, settings);
    let app = http::router(state, &config.engine.path);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        path = %config.engine.path,
        backend = ?config.event_bus.backend,
        "Subscription server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Subscription server stopped");
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&server.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match server.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Plain => builder.init(),
    }
}

async fn build_event_bus(
    config: &EventBusConfig,
    faults: &FaultReporter,
) -> Result<Arc<dyn EventBus>, Box<dyn Error>> {
    match config.backend {
        EventBusBackend::Memory => Ok(Arc::new(InMemoryEventBus::new())),
        EventBusBackend::Redis => {
            let redis = config
                .redis
                .as_ref()
                .ok_or(ValidationError::MissingRequired("EVENT_BUS__REDIS__URL"))?;
            let bus = tokio::time::timeout(
                redis.timeout(),
                RedisEventBus::connect(&redis.url, redis.channel_prefix.clone(), faults.clone()),
            )
            .await??;
            Ok(Arc::new(bus))
        }
    }
}

fn build_hooks(config: &AuthConfig) -> Result<Arc<dyn LifecycleHooks>, Box<dyn Error>> {
    if !config.is_enabled() {
        return Ok(Arc::new(NoopHooks));
    }

    let validator = StaticTokenValidator::from_entries(&config.static_tokens)?;
    tracing::info!(
        tokens = validator.len(),
        required = config.required,
        "Token authentication enabled"
    );
    Ok(Arc::new(TokenAuthHooks::new(Arc::new(validator), config.required)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
