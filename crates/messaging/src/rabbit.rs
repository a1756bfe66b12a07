//! AMQP 0-9-1 message bus backed by `lapin`, the production `MessageBus`.
//!
//! Connection is lazy: the first operation opens it. If a subsequent
//! operation finds the channel disconnected, it reconnects once before
//! surfacing an error, per spec §4.4 "Connection lifecycle".

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::acker::Acker;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tokio::sync::RwLock;

use crate::bus::{DeliveryStream, MessageBus, MessageDelivery};
use crate::error::{MessagingError, Result};

/// Persistent delivery mode, per spec §4.4/§6 "Message properties".
const PERSISTENT_DELIVERY_MODE: u8 = 2;

/// A `lapin`-backed message bus connected to a single AMQP broker.
///
/// Cheaply `Clone`: every clone shares the same pooled channel, matching
/// §4.4 "Channel pooling per process" — the orchestrator's result consumer
/// and every participant runtime in the `engine` binary hold a clone of the
/// same bus rather than opening one connection each.
#[derive(Clone)]
pub struct RabbitMessageBus {
    uri: Arc<String>,
    channel: Arc<RwLock<Option<Channel>>>,
}

impl RabbitMessageBus {
    /// Creates a bus for the given AMQP URI. Does not connect yet.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: Arc::new(uri.into()),
            channel: Arc::new(RwLock::new(None)),
        }
    }

    /// Returns a live channel, reconnecting once if the cached one has
    /// dropped. Channel pooling is per-process: one channel is shared by
    /// every caller, matching spec §4.4.
    async fn ensure_channel(&self) -> Result<Channel> {
        {
            let guard = self.channel.read().await;
            if let Some(channel) = guard.as_ref()
                && channel.status().connected()
            {
                return Ok(channel.clone());
            }
        }
        self.reconnect().await
    }

    async fn reconnect(&self) -> Result<Channel> {
        let connection = Connection::connect(&self.uri, ConnectionProperties::default())
            .await
            .map_err(|e| MessagingError::Connection(e.to_string()))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| MessagingError::Connection(e.to_string()))?;
        // The connection is intentionally leaked into the channel's lifetime:
        // lapin channels keep their connection alive via an internal Arc.
        std::mem::forget(connection);
        *self.channel.write().await = Some(channel.clone());
        Ok(channel)
    }
}

/// A delivery received from RabbitMQ, carrying the channel needed to ack/nack.
pub struct RabbitDelivery {
    body: Vec<u8>,
    acker: Acker,
}

#[async_trait]
impl MessageDelivery for RabbitDelivery {
    fn body(&self) -> &[u8] {
        &self.body
    }

    async fn ack(self) -> Result<()> {
        self.acker
            .ack(BasicAckOptions::default())
            .await
            .map_err(MessagingError::Amqp)
    }

    async fn nack(self, requeue: bool) -> Result<()> {
        self.acker
            .nack(BasicNackOptions {
                requeue,
                ..Default::default()
            })
            .await
            .map_err(MessagingError::Amqp)
    }
}

#[async_trait]
impl MessageBus for RabbitMessageBus {
    type Delivery = RabbitDelivery;

    async fn declare_topology(&self) -> Result<()> {
        let channel = self.ensure_channel().await?;
        for exchange in [crate::routing::SAGA_EXCHANGE, crate::routing::ORDER_EVENTS_EXCHANGE] {
            channel
                .exchange_declare(
                    exchange,
                    ExchangeKind::Topic,
                    ExchangeDeclareOptions {
                        durable: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(|e| MessagingError::Declare(e.to_string()))?;
        }
        Ok(())
    }

    async fn declare_queue(&self, queue: &str) -> Result<()> {
        let channel = self.ensure_channel().await?;
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    exclusive: false,
                    auto_delete: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| MessagingError::Declare(e.to_string()))?;
        Ok(())
    }

    async fn bind_queue(&self, queue: &str, exchange: &str, routing_key: &str) -> Result<()> {
        let channel = self.ensure_channel().await?;
        channel
            .queue_bind(
                queue,
                exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| MessagingError::Declare(e.to_string()))?;
        Ok(())
    }

    async fn publish(&self, exchange: &str, routing_key: &str, body: &[u8]) -> Result<()> {
        let channel = self.ensure_channel().await?;
        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(PERSISTENT_DELIVERY_MODE);
        channel
            .basic_publish(exchange, routing_key, BasicPublishOptions::default(), body, properties)
            .await
            .map_err(MessagingError::Amqp)?
            .await
            .map_err(MessagingError::Amqp)?;
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<DeliveryStream<Self::Delivery>> {
        let channel = self.ensure_channel().await?;
        let consumer = channel
            .basic_consume(
                queue,
                &format!("{queue}-consumer"),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| MessagingError::Consume(e.to_string()))?;

        let stream = consumer.filter_map(|delivery| async move {
            match delivery {
                Ok(delivery) => Some(RabbitDelivery {
                    body: delivery.data,
                    acker: delivery.acker,
                }),
                Err(e) => {
                    tracing::error!(error = %e, "consumer stream error");
                    None
                }
            }
        });

        Ok(Box::pin(stream))
    }
}
