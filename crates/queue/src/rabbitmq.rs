//! RabbitMQ-backed event bus.
//!
//! Holds exactly one connection/channel pair behind a mutex. Before every
//! publish the connection is health-probed and rebuilt if broken; the
//! exchange and the catch-all queue are declared idempotently on each
//! (re)connect so all event types land in one durable queue for the
//! downstream workflow engine. Backoff sleeps happen outside the lock so
//! one retry storm never serializes unrelated publishers.

use async_trait::async_trait;
use lapin::options::{
    BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use peyda_common::config::BrokerConfig;
use peyda_common::{AppError, AppResult};
use peyda_core::EventBus;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::retry::RetryConfig;

/// AMQP delivery mode for persistent messages.
const DELIVERY_MODE_PERSISTENT: u8 = 2;

struct BrokerState {
    connection: Connection,
    channel: Channel,
}

/// RabbitMQ implementation of the domain event bus.
pub struct RabbitMqEventBus {
    url: String,
    exchange: String,
    queue: String,
    state: Mutex<Option<BrokerState>>,
    retry: RetryConfig,
}

impl RabbitMqEventBus {
    /// Create a bus without connecting yet.
    #[must_use]
    pub fn new(config: &BrokerConfig) -> Self {
        Self {
            url: config.url.clone(),
            exchange: config.exchange.clone(),
            queue: config.queue.clone(),
            state: Mutex::new(None),
            retry: RetryConfig::default(),
        }
    }

    /// Override the retry schedule.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Create a bus and attempt the initial connection.
    ///
    /// A failure here is logged, not fatal: the connection is rebuilt on
    /// the first publish.
    pub async fn connect(config: &BrokerConfig) -> Self {
        let bus = Self::new(config);
        {
            let mut state = bus.state.lock().await;
            if let Err(e) = bus.ensure_connected(&mut state).await {
                warn!(error = %e, "RabbitMQ unavailable at startup; will reconnect on publish");
            }
        }
        bus
    }

    /// Whether the connection currently looks usable.
    pub async fn is_healthy(&self) -> bool {
        let state = self.state.lock().await;
        state.as_ref().is_some_and(|s| {
            s.connection.status().connected() && s.channel.status().connected()
        })
    }

    /// Close the connection.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if let Some(s) = state.take() {
            if let Err(e) = s.connection.close(0, "shutdown").await {
                warn!(error = %e, "Error closing RabbitMQ connection");
            }
        }
    }

    /// Probe the held connection and rebuild it if broken, redeclaring the
    /// exchange/queue topology. Declarations are idempotent on the broker.
    async fn ensure_connected(&self, state: &mut Option<BrokerState>) -> AppResult<()> {
        if let Some(existing) = state.as_ref() {
            if existing.connection.status().connected() && existing.channel.status().connected() {
                return Ok(());
            }
        }
        *state = None;

        let connection = Connection::connect(&self.url, ConnectionProperties::default())
            .await
            .map_err(broker_err)?;
        let channel = connection.create_channel().await.map_err(broker_err)?;

        channel
            .exchange_declare(
                &self.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(broker_err)?;

        channel
            .queue_declare(
                &self.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(broker_err)?;

        // Wildcard binding: every event type routes into the one queue.
        channel
            .queue_bind(
                &self.queue,
                &self.exchange,
                "#",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(broker_err)?;

        info!(
            exchange = %self.exchange,
            queue = %self.queue,
            "RabbitMQ connection established"
        );

        *state = Some(BrokerState {
            connection,
            channel,
        });
        Ok(())
    }

    async fn try_publish(
        &self,
        state: &mut Option<BrokerState>,
        routing_key: &str,
        body: &[u8],
    ) -> AppResult<()> {
        self.ensure_connected(state).await?;

        let Some(active) = state.as_ref() else {
            return Err(AppError::Broker("RabbitMQ connection unavailable".to_string()));
        };

        let confirm = active
            .channel
            .basic_publish(
                &self.exchange,
                routing_key,
                BasicPublishOptions::default(),
                body,
                BasicProperties::default()
                    .with_delivery_mode(DELIVERY_MODE_PERSISTENT)
                    .with_content_type("application/json".into()),
            )
            .await
            .map_err(broker_err)?;
        confirm.await.map_err(broker_err)?;

        Ok(())
    }
}

#[async_trait]
impl EventBus for RabbitMqEventBus {
    async fn publish(&self, event_type: &str, payload: Value) -> AppResult<()> {
        let body = encode_message(event_type, &payload)?;
        let routing_key = routing_key(event_type);

        let mut last_error = AppError::Broker("no publish attempt made".to_string());

        for attempt in 0..self.retry.max_attempts {
            {
                let mut state = self.state.lock().await;
                match self.try_publish(&mut state, &routing_key, &body).await {
                    Ok(()) => {
                        info!(event_type, "Published event");
                        return Ok(());
                    }
                    Err(e) => {
                        warn!(
                            event_type,
                            attempt = attempt + 1,
                            max_attempts = self.retry.max_attempts,
                            error = %e,
                            "Publish attempt failed"
                        );
                        *state = None;
                        last_error = e;
                    }
                }
            }

            // Sleep outside the lock.
            if self.retry.should_retry(attempt + 1) {
                tokio::time::sleep(self.retry.delay_for_attempt(attempt)).await;
            }
        }

        error!(
            event_type,
            error = %last_error,
            "Failed to publish event after retries"
        );
        Err(last_error)
    }
}

/// Routing key for an event type: dots become broker-safe underscores.
fn routing_key(event_type: &str) -> String {
    event_type.replace('.', "_")
}

/// Wire format: `{"event_type": ..., "payload": ...}`.
fn encode_message(event_type: &str, payload: &Value) -> AppResult<Vec<u8>> {
    serde_json::to_vec(&json!({
        "event_type": event_type,
        "payload": payload,
    }))
    .map_err(|e| AppError::Internal(format!("Failed to encode event message: {e}")))
}

fn broker_err(err: lapin::Error) -> AppError {
    AppError::Broker(err.to_string())
}
