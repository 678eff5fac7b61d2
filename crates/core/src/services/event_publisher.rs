//! Event publishing abstractions.
//!
//! Core services publish domain events without depending on the broker
//! implementation; the queue crate provides the RabbitMQ-backed [`EventBus`].
//! Events are consumed by an external workflow engine, never subscribed
//! to in-process.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use peyda_common::{AppResult, Clock};
use serde_json::Value;
use tracing::error;

/// Publish-only event bus.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an event to the bus.
    ///
    /// `event_type` is dot-namespaced (`match.found`, `otp.send_requested`);
    /// `payload` is the event body. Implementations retry transient failures
    /// internally and return the last error only after exhaustion.
    async fn publish(&self, event_type: &str, payload: Value) -> AppResult<()>;
}

/// Domain event publisher handed to every command service.
///
/// Injects the publish timestamp — callers never supply it — and offers the
/// log-and-continue [`DomainEvents::emit`] used on business write paths,
/// where a broker outage must never fail the write that produced the event.
#[derive(Clone)]
pub struct DomainEvents {
    bus: Arc<dyn EventBus>,
    clock: Arc<dyn Clock>,
}

impl DomainEvents {
    /// Create a new domain event publisher.
    #[must_use]
    pub fn new(bus: Arc<dyn EventBus>, clock: Arc<dyn Clock>) -> Self {
        Self { bus, clock }
    }

    /// Publish an event, surfacing the error after the bus has exhausted
    /// its retries.
    pub async fn publish(&self, event_type: &str, mut payload: Value) -> AppResult<()> {
        if let Value::Object(map) = &mut payload {
            map.insert("timestamp".to_string(), Value::from(self.clock.now_unix()));
        }
        self.bus.publish(event_type, payload).await
    }

    /// Publish an event, logging failures instead of propagating them.
    pub async fn emit(&self, event_type: &str, payload: Value) {
        if let Err(e) = self.publish(event_type, payload).await {
            error!(event_type, error = %e, "Failed to publish event; continuing without it");
        }
    }
}

/// An event captured by [`RecordingEventBus`].
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedEvent {
    pub event_type: String,
    pub payload: Value,
}

/// In-memory event bus for tests. Records every publish for assertions.
#[derive(Clone, Default)]
pub struct RecordingEventBus {
    events: Arc<Mutex<Vec<PublishedEvent>>>,
}

impl RecordingEventBus {
    /// Create an empty recording bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All published events, in order.
    #[must_use]
    pub fn events(&self) -> Vec<PublishedEvent> {
        #[allow(clippy::unwrap_used)]
        self.events.lock().unwrap().clone()
    }

    /// Published events of one type.
    #[must_use]
    pub fn events_of_type(&self, event_type: &str) -> Vec<PublishedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    /// The most recently published event, if any.
    #[must_use]
    pub fn last_event(&self) -> Option<PublishedEvent> {
        self.events().pop()
    }

    /// Whether nothing has been published.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events().is_empty()
    }

    /// Drop all recorded events.
    pub fn clear(&self) {
        #[allow(clippy::unwrap_used)]
        self.events.lock().unwrap().clear();
    }
}

#[async_trait]
impl EventBus for RecordingEventBus {
    async fn publish(&self, event_type: &str, payload: Value) -> AppResult<()> {
        #[allow(clippy::unwrap_used)]
        self.events.lock().unwrap().push(PublishedEvent {
            event_type: event_type.to_string(),
            payload,
        });
        Ok(())
    }
}

/// Event bus that always fails. Exercises degraded-broker paths in tests.
#[derive(Clone, Default)]
pub struct FailingEventBus;

#[async_trait]
impl EventBus for FailingEventBus {
    async fn publish(&self, _event_type: &str, _payload: Value) -> AppResult<()> {
        Err(peyda_common::AppError::Broker(
            "broker unreachable".to_string(),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use peyda_common::FakeClock;
    use serde_json::json;

    fn events_with_fakes() -> (DomainEvents, RecordingEventBus, Arc<FakeClock>) {
        let bus = RecordingEventBus::new();
        let clock = Arc::new(FakeClock::new());
        let events = DomainEvents::new(Arc::new(bus.clone()), clock.clone());
        (events, bus, clock)
    }

    #[tokio::test]
    async fn test_publish_injects_timestamp() {
        let (events, bus, clock) = events_with_fakes();

        events
            .publish("report.created", json!({"report_id": "r1"}))
            .await
            .unwrap();

        let published = bus.last_event().unwrap();
        assert_eq!(published.event_type, "report.created");
        assert_eq!(published.payload["report_id"], "r1");
        assert_eq!(published.payload["timestamp"], clock.now_unix());
    }

    #[tokio::test]
    async fn test_caller_supplied_timestamp_is_overwritten() {
        let (events, bus, clock) = events_with_fakes();

        events
            .publish("match.found", json!({"timestamp": 1}))
            .await
            .unwrap();

        assert_eq!(bus.last_event().unwrap().payload["timestamp"], clock.now_unix());
    }

    #[tokio::test]
    async fn test_emit_swallows_broker_failure() {
        let clock = Arc::new(FakeClock::new());
        let events = DomainEvents::new(Arc::new(FailingEventBus), clock);

        // Must not panic or propagate.
        events.emit("report.created", json!({"report_id": "r1"})).await;
    }

    #[tokio::test]
    async fn test_publish_surfaces_broker_failure() {
        let clock = Arc::new(FakeClock::new());
        let events = DomainEvents::new(Arc::new(FailingEventBus), clock);

        let result = events.publish("report.created", json!({})).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_recording_bus_filters_by_type() {
        let (events, bus, _) = events_with_fakes();

        events.emit("a.one", json!({})).await;
        events.emit("b.two", json!({})).await;
        events.emit("a.one", json!({})).await;

        assert_eq!(bus.events().len(), 3);
        assert_eq!(bus.events_of_type("a.one").len(), 2);
        assert!(bus.events_of_type("c.three").is_empty());

        bus.clear();
        assert!(bus.is_empty());
    }
}
