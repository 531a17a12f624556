//! End-to-end dispatch tests: connection lifecycle -> registry -> bus -> transport.
//!
//! Everything runs in-process against the in-memory event bus with a
//! recording transport standing in for WebSocket clients.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value as JsonValue};
use tokio::sync::Notify;

use subscriptions_engine::adapters::{InMemoryEventBus, PassthroughExecutor};
use subscriptions_engine::application::SubscriptionServer;
use subscriptions_engine::domain::connection::ConnectionPhase;
use subscriptions_engine::domain::event::{Event, Topic};
use subscriptions_engine::domain::foundation::{
    AuthContext, AuthRejected, ConnectionId, DomainError, ErrorCode, TransportError,
};
use subscriptions_engine::domain::protocol::{ClientMessage, OperationPayload, ServerMessage};
use subscriptions_engine::domain::subscription::{Arguments, ChannelBinding, SubscriptionRequest};
use subscriptions_engine::ports::{CloseReason, LifecycleHooks, QueryExecutor, Transport};

// =============================================================================
// Test doubles
// =============================================================================

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<(ConnectionId, ServerMessage)>>,
    closed: Mutex<Vec<(ConnectionId, CloseReason)>>,
}

impl RecordingTransport {
    fn data_for(&self, connection_id: ConnectionId) -> Vec<(String, JsonValue)> {
        self.sent
            .lock()
            .iter()
            .filter(|(id, _)| *id == connection_id)
            .filter_map(|(_, message)| match message {
                ServerMessage::Data { id, payload } => Some((id.clone(), payload.clone())),
                _ => None,
            })
            .collect()
    }

    fn errors_for(&self, connection_id: ConnectionId) -> Vec<(String, String)> {
        self.sent
            .lock()
            .iter()
            .filter(|(id, _)| *id == connection_id)
            .filter_map(|(_, message)| match message {
                ServerMessage::Error { id, payload } => {
                    Some((id.clone(), payload.code.to_string()))
                }
                _ => None,
            })
            .collect()
    }

    fn close_reason(&self, connection_id: ConnectionId) -> Option<CloseReason> {
        self.closed
            .lock()
            .iter()
            .find(|(id, _)| *id == connection_id)
            .map(|(_, reason)| reason.clone())
    }
}

impl Transport for RecordingTransport {
    fn send(&self, id: ConnectionId, message: ServerMessage) -> Result<(), TransportError> {
        self.sent.lock().push((id, message));
        Ok(())
    }

    fn close(&self, id: ConnectionId, reason: CloseReason) {
        self.closed.lock().push((id, reason));
    }
}

/// Holds every `on_connect` until released, then rejects.
#[derive(Default)]
struct GatedRejectHooks {
    gate: Notify,
}

#[async_trait]
impl LifecycleHooks for GatedRejectHooks {
    async fn on_connect(
        &self,
        _connection_id: ConnectionId,
        _params: &JsonValue,
    ) -> Result<AuthContext, AuthRejected> {
        self.gate.notified().await;
        Err(AuthRejected::new("bad credentials"))
    }
}

/// Blocks `execute` until released, to race a disconnect against a result.
#[derive(Default)]
struct SlowExecutor {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl QueryExecutor for SlowExecutor {
    fn resolve_operation(&self, operation: &OperationPayload) -> Result<String, DomainError> {
        Ok(operation.query.clone())
    }

    async fn execute(
        &self,
        _request: &SubscriptionRequest,
        event: &Event,
    ) -> Result<JsonValue, DomainError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(event.payload().clone())
    }
}

// =============================================================================
// Helpers
// =============================================================================

const COMMENT_ADDED: &str =
    "subscription onComment($repoFullName: String!) { commentAdded(repoFullName: $repoFullName) { id content } }";

fn githunt_server(transport: Arc<RecordingTransport>) -> SubscriptionServer {
    SubscriptionServer::builder(
        Arc::new(InMemoryEventBus::new()),
        Arc::new(PassthroughExecutor::new()),
        transport,
    )
    .with_setup("commentAdded", |_| {
        Ok(vec![ChannelBinding::field_equals(
            Topic::new("newCommentsChannel")?,
            "repoFullName",
            "repoFullName",
        )])
    })
    .build()
}

fn repo_variables(repo: &str) -> Arguments {
    let mut arguments = Arguments::new();
    arguments.insert("repoFullName".to_string(), json!(repo));
    arguments
}

async fn connect(server: &SubscriptionServer) -> ConnectionId {
    let connection_id = server.lifecycle().open();
    server
        .lifecycle()
        .handle_message(connection_id, ClientMessage::ConnectionInit { payload: json!({}) })
        .await;
    connection_id
}

async fn start(server: &SubscriptionServer, connection_id: ConnectionId, id: &str, repo: &str) {
    server
        .lifecycle()
        .handle_message(
            connection_id,
            ClientMessage::Start {
                id: id.to_string(),
                payload: OperationPayload::new(COMMENT_ADDED).with_variables(repo_variables(repo)),
            },
        )
        .await;
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn comment_reaches_only_subscribers_of_that_repo() {
    let transport = Arc::new(RecordingTransport::default());
    let server = githunt_server(transport.clone());

    let githunt = connect(&server).await;
    let other = connect(&server).await;
    start(&server, githunt, "1", "apollostack/GitHunt-API").await;
    start(&server, other, "1", "other/repo-API").await;

    server
        .publish(
            "newCommentsChannel",
            json!({"id": 123, "content": "Test", "repoFullName": "apollostack/GitHunt-API"}),
        )
        .await
        .unwrap();

    let delivered = transport.data_for(githunt);
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].0, "1");
    let comment = &delivered[0].1["data"]["commentAdded"];
    assert_eq!(comment["repoFullName"], json!("apollostack/GitHunt-API"));
    assert_eq!(comment["id"], json!(123));
    assert_eq!(comment["content"], json!("Test"));
    assert!(transport.data_for(other).is_empty());

    // Same comment on another repo: the GitHunt subscription stays quiet
    server
        .publish(
            "newCommentsChannel",
            json!({"id": 123, "content": "Test", "repoFullName": "other/repo"}),
        )
        .await
        .unwrap();

    assert_eq!(transport.data_for(githunt).len(), 1);
    assert!(transport.data_for(other).is_empty());
}

#[tokio::test]
async fn setup_binding_a_topic_twice_rejects_the_subscription() {
    let transport = Arc::new(RecordingTransport::default());
    let server = SubscriptionServer::builder(
        Arc::new(InMemoryEventBus::new()),
        Arc::new(PassthroughExecutor::new()),
        transport.clone(),
    )
    .with_setup("commentAdded", |_| {
        Ok(vec![
            ChannelBinding::always(Topic::new("newCommentsChannel")?),
            ChannelBinding::always(Topic::new("newCommentsChannel")?),
        ])
    })
    .build();

    let connection_id = connect(&server).await;
    start(&server, connection_id, "1", "apollostack/GitHunt-API").await;

    assert_eq!(server.registry().subscription_count(), 0);
    assert_eq!(
        server
            .bus()
            .listener_count(&Topic::new("newCommentsChannel").unwrap()),
        0
    );
    assert_eq!(
        transport.errors_for(connection_id),
        vec![("1".to_string(), "RESOLUTION_FAILED".to_string())]
    );

    server
        .publish("newCommentsChannel", json!({"repoFullName": "apollostack/GitHunt-API"}))
        .await
        .unwrap();
    assert!(transport.data_for(connection_id).is_empty());
}

#[tokio::test]
async fn publish_without_matching_subscriptions_delivers_nothing() {
    let transport = Arc::new(RecordingTransport::default());
    let server = githunt_server(transport.clone());
    let connection_id = connect(&server).await;
    start(&server, connection_id, "1", "apollostack/GitHunt").await;

    server
        .publish("unrelatedTopic", json!({"repoFullName": "apollostack/GitHunt"}))
        .await
        .unwrap();

    assert!(transport.data_for(connection_id).is_empty());
    assert_eq!(server.dispatch_stats().delivered, 0);
}

#[tokio::test]
async fn dropped_connection_receives_no_further_results() {
    let transport = Arc::new(RecordingTransport::default());
    let server = githunt_server(transport.clone());
    let connection_id = connect(&server).await;
    start(&server, connection_id, "1", "apollostack/GitHunt").await;
    start(&server, connection_id, "2", "apollostack/GitHunt").await;
    assert_eq!(server.registry().subscription_count(), 2);

    server.lifecycle().close(connection_id);

    assert_eq!(server.registry().subscription_count(), 0);
    server
        .publish("newCommentsChannel", json!({"repoFullName": "apollostack/GitHunt"}))
        .await
        .unwrap();
    assert!(transport.data_for(connection_id).is_empty());
}

#[tokio::test]
async fn stop_removes_only_that_operation() {
    let transport = Arc::new(RecordingTransport::default());
    let server = githunt_server(transport.clone());
    let connection_id = connect(&server).await;
    start(&server, connection_id, "keep", "apollostack/GitHunt").await;
    start(&server, connection_id, "drop", "apollostack/GitHunt").await;

    server
        .lifecycle()
        .handle_message(connection_id, ClientMessage::Stop { id: "drop".to_string() })
        .await;
    server
        .publish("newCommentsChannel", json!({"repoFullName": "apollostack/GitHunt"}))
        .await
        .unwrap();

    let ids: Vec<String> = transport
        .data_for(connection_id)
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    assert_eq!(ids, vec!["keep".to_string()]);
}

#[tokio::test]
async fn failing_filter_is_reported_to_its_subscription_only() {
    let transport = Arc::new(RecordingTransport::default());
    let server = SubscriptionServer::builder(
        Arc::new(InMemoryEventBus::new()),
        Arc::new(PassthroughExecutor::new()),
        transport.clone(),
    )
    .with_setup("commentAdded", |request| {
        let topic = Topic::new("newCommentsChannel")?;
        // A missing argument makes the equality filter fail at dispatch time
        if request.argument("repoFullName").is_some() {
            Ok(vec![ChannelBinding::field_equals(topic, "repoFullName", "repoFullName")])
        } else {
            Ok(vec![ChannelBinding::new(topic, |_, _| {
                Err(DomainError::new(ErrorCode::ValidationFailed, "filter blew up"))
            })])
        }
    })
    .build();

    let healthy = connect(&server).await;
    let broken = connect(&server).await;
    start(&server, healthy, "1", "apollostack/GitHunt").await;
    server
        .lifecycle()
        .handle_message(
            broken,
            ClientMessage::Start {
                id: "9".to_string(),
                payload: OperationPayload::new(COMMENT_ADDED),
            },
        )
        .await;
    assert_eq!(server.registry().subscription_count(), 2);

    server
        .publish("newCommentsChannel", json!({"repoFullName": "apollostack/GitHunt"}))
        .await
        .unwrap();

    assert_eq!(transport.data_for(healthy).len(), 1);
    assert!(transport.data_for(broken).is_empty());
    assert_eq!(
        transport.errors_for(broken),
        vec![("9".to_string(), "DISPATCH_FAULT".to_string())]
    );
    assert!(transport.errors_for(healthy).is_empty());
    // The broken subscription stays registered
    assert_eq!(server.registry().subscription_count(), 2);
}

#[tokio::test]
async fn rejected_connect_drops_starts_sent_while_authenticating() {
    let transport = Arc::new(RecordingTransport::default());
    let hooks = Arc::new(GatedRejectHooks::default());
    let server = Arc::new(
        SubscriptionServer::builder(
            Arc::new(InMemoryEventBus::new()),
            Arc::new(PassthroughExecutor::new()),
            transport.clone(),
        )
        .with_hooks(hooks.clone())
        .build(),
    );

    let connection_id = server.lifecycle().open();
    let init = {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            server
                .lifecycle()
                .handle_message(connection_id, ClientMessage::ConnectionInit { payload: json!({}) })
                .await;
        })
    };
    // Let on_connect start and park on the gate
    while server.lifecycle().phase(connection_id) != Some(ConnectionPhase::Authenticating) {
        tokio::task::yield_now().await;
    }

    let starts: Vec<_> = ["1", "2"]
        .into_iter()
        .map(|id| {
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                start(&server, connection_id, id, "apollostack/GitHunt").await;
            })
        })
        .collect();
    tokio::task::yield_now().await;

    hooks.gate.notify_one();
    init.await.unwrap();
    for task in starts {
        task.await.unwrap();
    }

    assert_eq!(server.registry().subscription_count(), 0);
    assert!(!server.registry().is_open(connection_id));
    assert!(matches!(
        transport.close_reason(connection_id),
        Some(CloseReason::AuthRejected(_))
    ));
    assert!(transport.data_for(connection_id).is_empty());
}

#[tokio::test]
async fn double_unregister_is_a_silent_no_op() {
    let transport = Arc::new(RecordingTransport::default());
    let server = githunt_server(transport.clone());
    let mut faults = server.faults();
    let connection_id = connect(&server).await;
    start(&server, connection_id, "1", "apollostack/GitHunt").await;

    let subscription_id = server.registry().connection_subscriptions(connection_id)[0];
    assert!(server.registry().unregister(subscription_id).is_some());
    assert!(server.registry().unregister(subscription_id).is_none());

    assert_eq!(server.registry().subscription_count(), 0);
    assert!(faults.try_recv().is_err());
}

#[tokio::test]
async fn result_finishing_after_disconnect_is_discarded() {
    let transport = Arc::new(RecordingTransport::default());
    let executor = Arc::new(SlowExecutor::default());
    let server = Arc::new(
        SubscriptionServer::builder(
            Arc::new(InMemoryEventBus::new()),
            executor.clone(),
            transport.clone(),
        )
        .build(),
    );

    let connection_id = connect(&server).await;
    server
        .lifecycle()
        .handle_message(
            connection_id,
            ClientMessage::Start {
                id: "1".to_string(),
                payload: OperationPayload::new("ticks"),
            },
        )
        .await;

    let publish = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.publish("ticks", json!({"n": 1})).await })
    };
    tokio::time::timeout(Duration::from_secs(1), executor.entered.notified())
        .await
        .unwrap();

    server.lifecycle().close(connection_id);
    executor.release.notify_one();
    publish.await.unwrap().unwrap();

    assert!(transport.data_for(connection_id).is_empty());
    assert_eq!(server.dispatch_stats().discarded, 1);
}
