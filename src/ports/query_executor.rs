//! QueryExecutor port - The result-producing step re-run on every matching event.
//!
//! Schema handling and GraphQL execution live outside this crate. The engine
//! only needs two things from that layer: the logical name of a subscription
//! operation, and a result for (operation, event, arguments, context).

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::domain::event::Event;
use crate::domain::foundation::DomainError;
use crate::domain::protocol::OperationPayload;
use crate::domain::subscription::SubscriptionRequest;

/// Produces subscription results.
///
/// # Contract
///
/// - `resolve_operation` is called once per `start`; an error rejects the
///   subscription before any hook or resolver runs.
/// - `execute` is called once per matching subscription per publish. An
///   error is reported to that subscription only.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Logical subscription name for an operation (e.g. `commentAdded`).
    fn resolve_operation(&self, operation: &OperationPayload) -> Result<String, DomainError>;

    /// Produce the result for one event.
    async fn execute(
        &self,
        request: &SubscriptionRequest,
        event: &Event,
    ) -> Result<JsonValue, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn QueryExecutor) {}

    #[test]
    fn query_executor_arc_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<std::sync::Arc<dyn QueryExecutor>>();
    }
}
