//! Fault reporting for failures with no attributable connection.
//!
//! Connection-scoped failures go to the client as `error` messages. Anything
//! else (a broker stream dying, an undecodable bus message) is logged and
//! broadcast here so the host process can react.

use tokio::sync::broadcast;

use crate::domain::foundation::EngineFault;

const DEFAULT_CAPACITY: usize = 64;

/// Cloneable handle for reporting and observing engine faults.
#[derive(Debug, Clone)]
pub struct FaultReporter {
    tx: broadcast::Sender<EngineFault>,
}

impl FaultReporter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Log the fault and broadcast it to observers (if any).
    pub fn report(&self, fault: EngineFault) {
        tracing::error!(
            source = fault.source_name,
            subscription_id = ?fault.subscription_id,
            "Engine fault: {}",
            fault.message
        );
        // No observers is fine, the log line above is the record
        let _ = self.tx.send(fault);
    }

    /// Observe faults reported from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineFault> {
        self.tx.subscribe()
    }
}

impl Default for FaultReporter {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_reported_faults() {
        let reporter = FaultReporter::default();
        let mut rx = reporter.subscribe();

        reporter.report(EngineFault::new("test", "stream ended"));

        let fault = rx.recv().await.unwrap();
        assert_eq!(fault.source_name, "test");
        assert_eq!(fault.message, "stream ended");
    }

    #[test]
    fn report_without_subscribers_does_not_panic() {
        FaultReporter::new(0).report(EngineFault::new("test", "nobody listening"));
    }
}
