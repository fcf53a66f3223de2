//! Publisher - one connect/publish/disconnect cycle per payload

use crate::error::TransportError;
use crate::transport::Transport;
use ivy_shared::PublishOutcome;
use serde::Serialize;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Wraps a transport so that every publish attempt ends in an outcome,
/// never an error
pub struct Publisher<T: Transport> {
    transport: T,
    attempt_timeout: Duration,
}

impl<T: Transport> Publisher<T> {
    pub fn new(transport: T, attempt_timeout: Duration) -> Self {
        Self {
            transport,
            attempt_timeout,
        }
    }

    /// Serialize `payload` and publish it retained to `topic`
    pub async fn publish<P: Serialize + Sync>(&mut self, topic: &str, payload: &P) -> PublishOutcome {
        let bytes = match serde_json::to_vec(payload) {
            Ok(bytes) => bytes,
            Err(e) => return PublishOutcome::TransientFailure(TransportError::from(e).to_string()),
        };

        match timeout(self.attempt_timeout, self.attempt(topic, &bytes)).await {
            Ok(Ok(())) => {
                info!("[PUBLISH] {} bytes to {}", bytes.len(), topic);
                PublishOutcome::Success
            }
            Ok(Err(e)) => {
                warn!("[PUBLISH] {} via {} failed: {}", topic, self.transport.name(), e);
                self.abandon().await;
                PublishOutcome::TransientFailure(e.to_string())
            }
            Err(_) => {
                warn!(
                    "[PUBLISH] {} via {} timed out after {:?}",
                    topic,
                    self.transport.name(),
                    self.attempt_timeout
                );
                self.abandon().await;
                PublishOutcome::TransientFailure(format!(
                    "publish timed out after {:?}",
                    self.attempt_timeout
                ))
            }
        }
    }

    async fn attempt(&mut self, topic: &str, bytes: &[u8]) -> Result<(), TransportError> {
        self.transport.connect().await?;
        self.transport.publish(topic, bytes, true).await?;
        self.transport.disconnect().await
    }

    /// Best-effort teardown after a failed attempt
    async fn abandon(&mut self) {
        match timeout(self.attempt_timeout, self.transport.disconnect()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("[PUBLISH] Disconnect after failure: {}", e),
            Err(_) => debug!("[PUBLISH] Disconnect after failure timed out"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::fake::FakeTransport;
    use serde_json::json;

    #[tokio::test]
    async fn test_successful_publish_is_retained_and_disconnects() {
        let transport = FakeTransport::new();
        let mut publisher = Publisher::new(transport.clone(), Duration::from_secs(1));

        let outcome = publisher.publish("plants/ivy", &json!({"lux": 12.5})).await;

        assert_eq!(outcome, PublishOutcome::Success);
        let broker = transport.broker();
        assert_eq!(broker.calls, vec!["connect", "publish", "disconnect"]);
        let (topic, payload, retain) = &broker.published[0];
        assert_eq!(topic, "plants/ivy");
        assert_eq!(payload.as_slice(), br#"{"lux":12.5}"#);
        assert!(*retain);
        assert!(!broker.connected);
    }

    #[tokio::test]
    async fn test_connect_failure_becomes_transient() {
        let transport = FakeTransport::new();
        transport.broker().connect_failures = 1;
        let mut publisher = Publisher::new(transport.clone(), Duration::from_secs(1));

        let outcome = publisher.publish("plants/ivy", &json!({})).await;

        assert!(matches!(outcome, PublishOutcome::TransientFailure(ref reason) if reason.contains("fake broker down")));
        assert!(transport.broker().published.is_empty());
    }

    #[tokio::test]
    async fn test_publish_failure_still_disconnects() {
        let transport = FakeTransport::new();
        transport.broker().publish_fails = true;
        let mut publisher = Publisher::new(transport.clone(), Duration::from_secs(1));

        let outcome = publisher.publish("plants/ivy", &json!({})).await;

        assert!(!outcome.is_success());
        assert_eq!(transport.broker().calls.last(), Some(&"disconnect"));
        assert!(!transport.broker().connected);
    }

    #[tokio::test]
    async fn test_hung_publish_times_out() {
        let transport = FakeTransport::new();
        transport.broker().publish_hangs = true;
        let mut publisher = Publisher::new(transport.clone(), Duration::from_millis(50));

        let outcome = publisher.publish("plants/ivy", &json!({})).await;

        assert!(matches!(outcome, PublishOutcome::TransientFailure(ref reason) if reason.contains("timed out")));
        assert!(!transport.broker().connected);
    }
}
