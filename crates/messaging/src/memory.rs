//! In-memory message bus for tests and the in-process seed-test harness.
//!
//! Mirrors the topology operations of the AMQP adapter (declare, bind,
//! publish, consume-with-manual-ack) over `tokio::sync::mpsc` channels,
//! the same way the teacher's `InMemoryEventStore` mirrors `PostgresEventStore`
//! behind the shared `EventStore` trait.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;
use tokio::sync::{Mutex, RwLock, mpsc};

use crate::bus::{DeliveryStream, MessageBus, MessageDelivery};
use crate::error::{MessagingError, Result};

struct Queue {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
}

/// A topic-matching in-memory broker. Routing keys are dot-separated;
/// a binding pattern segment of `*` matches exactly one segment, matching
/// the subset of AMQP topic-exchange semantics this engine relies on
/// (`saga.<step>.execute|compensate|result`, `saga.*.result`).
#[derive(Clone, Default)]
pub struct InMemoryMessageBus {
    exchanges: Arc<RwLock<Vec<String>>>,
    queues: Arc<RwLock<HashMap<String, Arc<Queue>>>>,
    bindings: Arc<RwLock<HashMap<String, Vec<(String, String)>>>>,
}

impl InMemoryMessageBus {
    /// Creates a fresh, empty in-memory bus.
    pub fn new() -> Self {
        Self::default()
    }

    fn matches(pattern: &str, routing_key: &str) -> bool {
        let pattern_parts: Vec<&str> = pattern.split('.').collect();
        let key_parts: Vec<&str> = routing_key.split('.').collect();
        if pattern_parts.len() != key_parts.len() {
            return false;
        }
        pattern_parts
            .iter()
            .zip(key_parts.iter())
            .all(|(p, k)| *p == "*" || p == k)
    }
}

/// A delivery handle backed by the in-memory broker. Nacking with
/// `requeue = true` resends the body onto the originating queue after a
/// short delay, simulating the broker's own redelivery delay.
pub struct InMemoryDelivery {
    body: Vec<u8>,
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

#[async_trait]
impl MessageDelivery for InMemoryDelivery {
    fn body(&self) -> &[u8] {
        &self.body
    }

    async fn ack(self) -> Result<()> {
        Ok(())
    }

    async fn nack(self, requeue: bool) -> Result<()> {
        if requeue {
            let tx = self.tx.clone();
            let body = self.body;
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                let _ = tx.send(body);
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    type Delivery = InMemoryDelivery;

    async fn declare_topology(&self) -> Result<()> {
        let mut exchanges = self.exchanges.write().await;
        for name in [crate::routing::SAGA_EXCHANGE, crate::routing::ORDER_EVENTS_EXCHANGE] {
            if !exchanges.iter().any(|e| e == name) {
                exchanges.push(name.to_string());
            }
        }
        Ok(())
    }

    async fn declare_queue(&self, queue: &str) -> Result<()> {
        let mut queues = self.queues.write().await;
        queues.entry(queue.to_string()).or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            Arc::new(Queue {
                tx,
                rx: Mutex::new(Some(rx)),
            })
        });
        Ok(())
    }

    async fn bind_queue(&self, queue: &str, exchange: &str, routing_key: &str) -> Result<()> {
        if !self.queues.read().await.contains_key(queue) {
            return Err(MessagingError::Declare(format!("queue {queue} not declared")));
        }
        self.bindings
            .write()
            .await
            .entry(exchange.to_string())
            .or_default()
            .push((routing_key.to_string(), queue.to_string()));
        Ok(())
    }

    async fn publish(&self, exchange: &str, routing_key: &str, body: &[u8]) -> Result<()> {
        let bindings = self.bindings.read().await;
        let Some(exchange_bindings) = bindings.get(exchange) else {
            return Ok(());
        };
        let queues = self.queues.read().await;
        for (pattern, queue_name) in exchange_bindings {
            if Self::matches(pattern, routing_key)
                && let Some(queue) = queues.get(queue_name)
            {
                queue
                    .tx
                    .send(body.to_vec())
                    .map_err(|e| MessagingError::Connection(e.to_string()))?;
            }
        }
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<DeliveryStream<Self::Delivery>> {
        let queues = self.queues.read().await;
        let queue = queues
            .get(queue)
            .ok_or_else(|| MessagingError::Consume(format!("queue {queue} not declared")))?
            .clone();
        let mut guard = queue.rx.lock().await;
        let rx = guard
            .take()
            .ok_or_else(|| MessagingError::Consume("queue already has a consumer".to_string()))?;
        drop(guard);

        let tx = queue.tx.clone();
        let s = stream::unfold((rx, tx), |(mut rx, tx)| async move {
            let body = rx.recv().await?;
            let delivery = InMemoryDelivery { body, tx: tx.clone() };
            Some((delivery, (rx, tx)))
        });
        Ok(Box::pin(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Envelope;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn publish_reaches_a_bound_queue() {
        let bus = InMemoryMessageBus::new();
        bus.declare_topology().await.unwrap();
        bus.declare_queue("process_billing_execute_queue").await.unwrap();
        bus.bind_queue(
            "process_billing_execute_queue",
            crate::routing::SAGA_EXCHANGE,
            &crate::routing::execute_key("process_billing"),
        )
        .await
        .unwrap();

        let envelope = Envelope::execute_command("saga-1", "process_billing", b"data".to_vec());
        bus.publish(
            crate::routing::SAGA_EXCHANGE,
            &crate::routing::execute_key("process_billing"),
            &envelope.to_bytes().unwrap(),
        )
        .await
        .unwrap();

        let mut stream = bus.consume("process_billing_execute_queue").await.unwrap();
        let delivery = stream.next().await.unwrap();
        let decoded = Envelope::from_bytes(delivery.body()).unwrap();
        assert_eq!(decoded.saga_id, "saga-1");
        delivery.ack().await.unwrap();
    }

    #[tokio::test]
    async fn wildcard_binding_matches_any_step() {
        let bus = InMemoryMessageBus::new();
        bus.declare_topology().await.unwrap();
        bus.declare_queue(crate::routing::RESULT_QUEUE).await.unwrap();
        bus.bind_queue(
            crate::routing::RESULT_QUEUE,
            crate::routing::SAGA_EXCHANGE,
            crate::routing::RESULT_BINDING,
        )
        .await
        .unwrap();

        let envelope = Envelope::execute_completed("saga-1", "reserve_warehouse", vec![]);
        bus.publish(
            crate::routing::SAGA_EXCHANGE,
            &crate::routing::result_key("reserve_warehouse"),
            &envelope.to_bytes().unwrap(),
        )
        .await
        .unwrap();

        let mut stream = bus.consume(crate::routing::RESULT_QUEUE).await.unwrap();
        let delivery = stream.next().await.unwrap();
        let decoded = Envelope::from_bytes(delivery.body()).unwrap();
        assert_eq!(decoded.step_name, "reserve_warehouse");
    }

    #[tokio::test]
    async fn nack_with_requeue_redelivers() {
        let bus = InMemoryMessageBus::new();
        bus.declare_topology().await.unwrap();
        bus.declare_queue("q").await.unwrap();
        bus.bind_queue("q", crate::routing::SAGA_EXCHANGE, "saga.x.execute")
            .await
            .unwrap();

        let envelope = Envelope::execute_command("saga-1", "x", vec![]);
        bus.publish(crate::routing::SAGA_EXCHANGE, "saga.x.execute", &envelope.to_bytes().unwrap())
            .await
            .unwrap();

        let mut stream = bus.consume("q").await.unwrap();
        let first = stream.next().await.unwrap();
        first.nack(true).await.unwrap();

        let redelivered = stream.next().await.unwrap();
        let decoded = Envelope::from_bytes(redelivered.body()).unwrap();
        assert_eq!(decoded.saga_id, "saga-1");
    }

    #[tokio::test]
    async fn publishing_to_an_unbound_routing_key_is_a_noop() {
        let bus = InMemoryMessageBus::new();
        bus.declare_topology().await.unwrap();
        let envelope = Envelope::execute_command("saga-1", "ghost", vec![]);
        bus.publish(
            crate::routing::SAGA_EXCHANGE,
            "saga.ghost.execute",
            &envelope.to_bytes().unwrap(),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn a_second_consumer_on_the_same_queue_is_rejected() {
        let bus = InMemoryMessageBus::new();
        bus.declare_queue("q").await.unwrap();
        let _first = bus.consume("q").await.unwrap();
        let second = bus.consume("q").await;
        assert!(second.is_err());
    }
}
