//! Durable event delivery for peyda-rs.
//!
//! Implements the core's [`peyda_core::EventBus`] over RabbitMQ: a topic
//! exchange, one durable catch-all queue for the downstream workflow
//! engine, and bounded-backoff retry around every publish.

pub mod rabbitmq;
pub mod retry;

pub use rabbitmq::RabbitMqEventBus;
pub use retry::RetryConfig;
