//! AMQP-backed [`crate::MessageBus`] implementation, built on `lapin`.

use crate::{Delivery, DeliveryHandle, MessageBus};
use alexandria_core::error::{Error, Result};
use alexandria_core::types::{DocIngestedMessage, IndexRequestMessage};
use async_trait::async_trait;
use lapin::options::{
    BasicAckOptions, BasicGetOptions, BasicNackOptions, BasicPublishOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{error, info, warn};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Durable AMQP client with exponential-backoff reconnect (spec §4.5).
pub struct AmqpBus {
    url: String,
    max_reconnect_attempts: u32,
    channel: Mutex<Channel>,
}

impl AmqpBus {
    /// Connects, establishing the channel used for every publish/receive.
    /// Retries with exponential backoff (1s doubling to a 30s cap) up to
    /// `max_reconnect_attempts` times before giving up at startup.
    pub async fn connect(url: &str, max_reconnect_attempts: u32) -> Result<Self> {
        let channel = Self::connect_with_backoff(url, max_reconnect_attempts).await?;
        Ok(Self { url: url.to_string(), max_reconnect_attempts, channel: Mutex::new(channel) })
    }

    async fn connect_with_backoff(url: &str, max_attempts: u32) -> Result<Channel> {
        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match Self::dial(url).await {
                Ok(channel) => return Ok(channel),
                Err(e) if attempt >= max_attempts => {
                    return Err(Error::Fatal(format!(
                        "could not connect to broker at {url} after {attempt} attempts: {e}"
                    )));
                }
                Err(e) => {
                    warn!(attempt, backoff_secs = backoff.as_secs(), error = %e, "broker connect failed, retrying");
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }

    async fn dial(url: &str) -> std::result::Result<Channel, lapin::Error> {
        let options = ConnectionProperties::default()
            .with_executor(tokio_executor_trait::Tokio::current())
            .with_reactor(tokio_reactor_trait::Tokio);
        let connection = Connection::connect(url, options).await?;
        connection.create_channel().await
    }

    /// Re-establishes the connection in place. Because declarations are
    /// idempotent and we never hold a long-lived server-push consumer
    /// (callers pull via [`MessageBus::receive`]), reconnecting and
    /// re-declaring a queue on first use after a reconnect is equivalent
    /// to "subscriptions are automatically re-established" (spec §4.5).
    async fn reconnect(&self) -> Result<()> {
        info!(url = %self.url, "reconnecting to broker");
        let fresh = Self::connect_with_backoff(&self.url, self.max_reconnect_attempts).await?;
        *self.channel.lock().await = fresh;
        Ok(())
    }

    async fn declare_queue(channel: &Channel, queue: &str) -> std::result::Result<(), lapin::Error> {
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions { durable: true, ..Default::default() },
                FieldTable::default(),
            )
            .await?;
        Ok(())
    }

    async fn publish_json(&self, queue: &str, idempotency_key: &str, book_id: u64, node_id: &str, body: &[u8]) -> Result<()> {
        let channel = self.channel.lock().await;
        if let Err(e) = Self::declare_queue(&channel, queue).await {
            drop(channel);
            warn!(error = %e, "queue declare failed, reconnecting");
            self.reconnect().await?;
            return Box::pin(self.publish_json(queue, idempotency_key, book_id, node_id, body)).await;
        }

        let mut headers = FieldTable::default();
        headers.insert("idempotencyKey".into(), idempotency_key.into());
        headers.insert("bookId".into(), (book_id as i64).into());
        headers.insert("sourceNodeId".into(), node_id.into());

        let properties = BasicProperties::default()
            .with_delivery_mode(2) // persistent
            .with_headers(headers);

        let publish = channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                body,
                properties,
            )
            .await;

        match publish {
            Ok(confirm) => {
                confirm.await.map_err(|e| Error::Transient(e.to_string()))?;
                Ok(())
            }
            Err(e) => Err(Error::Transient(e.to_string())),
        }
    }
}

#[async_trait]
impl MessageBus for AmqpBus {
    async fn publish(&self, queue: &str, message: &IndexRequestMessage) -> Result<()> {
        let body = serde_json::to_vec(message).map_err(|e| Error::Fatal(e.to_string()))?;
        self.publish_json(queue, &message.idempotency_key(), message.book_id, &message.node_id, &body).await
    }

    async fn publish_ingested(&self, queue: &str, message: &DocIngestedMessage) -> Result<()> {
        let body = serde_json::to_vec(message).map_err(|e| Error::Fatal(e.to_string()))?;
        let idempotency_key = alexandria_core::hash::idempotency_key(message.book_id, &message.content_hash);
        self.publish_json(queue, &idempotency_key, message.book_id, &message.node_id, &body).await
    }

    async fn receive(&self, queue: &str) -> Result<Option<Delivery>> {
        let channel = self.channel.lock().await;
        if let Err(e) = Self::declare_queue(&channel, queue).await {
            drop(channel);
            warn!(error = %e, "queue declare failed, reconnecting");
            self.reconnect().await?;
            return Box::pin(self.receive(queue)).await;
        }

        let get = channel.basic_get(queue, BasicGetOptions::default()).await;
        let delivery = match get {
            Ok(Some(d)) => d,
            Ok(None) => return Ok(None),
            Err(e) => {
                drop(channel);
                error!(error = %e, "basic_get failed, reconnecting");
                self.reconnect().await?;
                return Ok(None);
            }
        };

        let message: IndexRequestMessage = match serde_json::from_slice(&delivery.data) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "malformed index.request payload, acking to avoid poison-pill");
                let _ = delivery.ack(BasicAckOptions::default()).await;
                return Ok(None);
            }
        };

        Ok(Some(Delivery::new(message, Box::new(AmqpDeliveryHandle { delivery }))))
    }
}

struct AmqpDeliveryHandle {
    delivery: lapin::message::Delivery,
}

#[async_trait]
impl DeliveryHandle for AmqpDeliveryHandle {
    async fn ack(self: Box<Self>) -> Result<()> {
        self.delivery
            .ack(BasicAckOptions::default())
            .await
            .map_err(|e| Error::Transient(e.to_string()))
    }

    async fn requeue(self: Box<Self>) -> Result<()> {
        self.delivery
            .nack(BasicNackOptions { requeue: true, ..Default::default() })
            .await
            .map_err(|e| Error::Transient(e.to_string()))
    }
}
