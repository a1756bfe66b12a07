//! The `MessageBus` trait: topic exchange, durable queues, manual ack (§4.4).

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::Stream;

use crate::error::Result;

/// Default number of publish attempts before surfacing the last error.
pub const DEFAULT_PUBLISH_RETRIES: u32 = 3;

/// A single inbound message, carrying the raw body bytes and the broker's
/// ack/nack handle. A handler acks after successfully publishing its one
/// reply; nacking with `requeue = true` asks the broker to redeliver.
///
/// The bus itself is payload-agnostic: it moves opaque JSON bytes. Saga
/// commands/results are serialized [`crate::envelope::Envelope`]s; the
/// `order_events` exchange carries a simpler JSON shape (§6). Callers decode
/// the body into whichever shape the routing key implies.
#[async_trait]
pub trait MessageDelivery: Send {
    /// The raw message body.
    fn body(&self) -> &[u8];

    /// Acknowledges successful processing.
    async fn ack(self) -> Result<()>;

    /// Rejects the message; `requeue` controls whether the broker redelivers.
    async fn nack(self, requeue: bool) -> Result<()>;
}

/// A stream of inbound deliveries from a consumed queue.
pub type DeliveryStream<D> = Pin<Box<dyn Stream<Item = D> + Send>>;

/// The messaging adapter contract described in spec §4.4.
///
/// Implementations: [`crate::rabbit::RabbitMessageBus`] (production, AMQP
/// 0-9-1 via `lapin`) and [`crate::memory::InMemoryMessageBus`] (tests and
/// the in-process seed-test harness).
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// The delivery type yielded by this bus's consumers.
    type Delivery: MessageDelivery;

    /// Declares both topic exchanges (`saga_exchange`, `order_events`),
    /// durable, idempotently. Safe to call from every process at startup.
    async fn declare_topology(&self) -> Result<()>;

    /// Declares a durable, non-exclusive, non-auto-delete queue.
    async fn declare_queue(&self, queue: &str) -> Result<()>;

    /// Binds a queue to an exchange with the given routing-key pattern.
    async fn bind_queue(&self, queue: &str, exchange: &str, routing_key: &str) -> Result<()>;

    /// Publishes one message body with persistent delivery mode and
    /// content-type `application/json`.
    async fn publish(&self, exchange: &str, routing_key: &str, body: &[u8]) -> Result<()>;

    /// Begins consuming a queue with manual ack, one delivery at a time.
    async fn consume(&self, queue: &str) -> Result<DeliveryStream<Self::Delivery>>;

    /// Publishes with retry: `retries` attempts, backoff `i * 1s`, surfacing
    /// the last error. The default retry count is [`DEFAULT_PUBLISH_RETRIES`].
    async fn publish_with_retry(
        &self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
        retries: u32,
    ) -> Result<()> {
        let attempts = retries.max(1);
        let mut last_err = None;
        for attempt in 1..=attempts {
            match self.publish(exchange, routing_key, body).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(attempt, %exchange, %routing_key, error = %e, "publish attempt failed");
                    last_err = Some(e.to_string());
                    if attempt < attempts {
                        tokio::time::sleep(Duration::from_secs(u64::from(attempt))).await;
                    }
                }
            }
        }
        Err(crate::error::MessagingError::PublishFailed {
            attempts,
            source: last_err.expect("loop runs at least once"),
        })
    }
}
