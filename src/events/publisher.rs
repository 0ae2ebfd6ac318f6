use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::constants::events;

/// Kind of circuit breaker lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitEventKind {
    Opened,
    HalfOpened,
    Closed,
}

impl CircuitEventKind {
    /// Stable event name for downstream consumers.
    pub fn name(&self) -> &'static str {
        match self {
            CircuitEventKind::Opened => events::CIRCUIT_OPENED,
            CircuitEventKind::HalfOpened => events::CIRCUIT_HALF_OPENED,
            CircuitEventKind::Closed => events::CIRCUIT_CLOSED,
        }
    }
}

/// Payload published on every breaker state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerEvent {
    pub kind: CircuitEventKind,
    pub service: String,
    pub timestamp: DateTime<Utc>,
    /// Present on `Opened` events: the failure count that tripped the breaker.
    pub failure_count: Option<u32>,
}

impl CircuitBreakerEvent {
    /// JSON wire form for downstream sinks, keyed by the stable event name.
    pub fn payload(&self) -> serde_json::Value {
        serde_json::json!({
            "event": self.kind.name(),
            "service": self.service,
            "timestamp": self.timestamp.to_rfc3339(),
            "failure_count": self.failure_count,
        })
    }
}

/// Broadcast publisher for breaker lifecycle events.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<CircuitBreakerEvent>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a breaker event.
    ///
    /// A broadcast send fails only when there are no subscribers, which is
    /// acceptable here: the breaker transitions regardless of whether anyone
    /// is listening.
    pub fn publish(&self, event: CircuitBreakerEvent) {
        tracing::debug!(
            event = event.kind.name(),
            service = %event.service,
            failure_count = event.failure_count,
            "publishing circuit breaker event"
        );
        let _ = self.sender.send(event);
    }

    /// Subscribe to breaker events.
    pub fn subscribe(&self) -> broadcast::Receiver<CircuitBreakerEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let publisher = EventPublisher::new(16);
        let mut rx = publisher.subscribe();

        publisher.publish(CircuitBreakerEvent {
            kind: CircuitEventKind::Opened,
            service: "payment-api".to_string(),
            timestamp: Utc::now(),
            failure_count: Some(3),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, CircuitEventKind::Opened);
        assert_eq!(event.service, "payment-api");
        assert_eq!(event.failure_count, Some(3));
        assert_eq!(event.kind.name(), "circuit_breaker.opened");

        let payload = event.payload();
        assert_eq!(payload["event"], "circuit_breaker.opened");
        assert_eq!(payload["service"], "payment-api");
        assert_eq!(payload["failure_count"], 3);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_ok() {
        let publisher = EventPublisher::default();
        assert_eq!(publisher.subscriber_count(), 0);
        publisher.publish(CircuitBreakerEvent {
            kind: CircuitEventKind::Closed,
            service: "payment-api".to_string(),
            timestamp: Utc::now(),
            failure_count: None,
        });
    }
}
