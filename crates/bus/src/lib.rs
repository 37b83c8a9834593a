//! Message bus client (C5, spec §4.5) — two logical queues, `index.request`
//! and `doc.ingested`, at-least-once, persistent, reconnect with backoff.
//!
//! [`MessageBus`] is a pull-based trait: callers loop on [`MessageBus::receive`]
//! and explicitly [`Delivery::ack`] or [`Delivery::requeue`] once their
//! handler finishes, exactly as spec §4.5 describes acknowledgement
//! ("delivered only after the consumer's handler returns without
//! failure"). [`AmqpBus`] is the production implementation; [`InMemoryBus`]
//! is a same-contract test double used by the indexing engine's own tests
//! and by the end-to-end cluster tests in the `server` crate.

pub mod amqp;
pub mod memory;

use alexandria_core::error::Result;
use alexandria_core::types::{DocIngestedMessage, IndexRequestMessage};
use async_trait::async_trait;

pub use amqp::AmqpBus;
pub use memory::InMemoryBus;

pub const INDEX_REQUEST_QUEUE: &str = "index.request";
pub const DOC_INGESTED_QUEUE: &str = "doc.ingested";

/// A single pulled message plus the means to acknowledge or requeue it.
pub struct Delivery {
    pub message: IndexRequestMessage,
    handle: Box<dyn DeliveryHandle>,
}

impl Delivery {
    pub fn new(message: IndexRequestMessage, handle: Box<dyn DeliveryHandle>) -> Self {
        Self { message, handle }
    }

    /// Acknowledge successful processing. The broker will not redeliver.
    pub async fn ack(self) -> Result<()> {
        self.handle.ack().await
    }

    /// The handler failed or threw — leave the message to be redelivered.
    pub async fn requeue(self) -> Result<()> {
        self.handle.requeue().await
    }
}

#[async_trait]
pub trait DeliveryHandle: Send + Sync {
    async fn ack(self: Box<Self>) -> Result<()>;
    async fn requeue(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish to `index.request`. Persistent; survives broker restart.
    async fn publish(&self, queue: &str, message: &IndexRequestMessage) -> Result<()>;

    /// Publish an informational `doc.ingested` event.
    async fn publish_ingested(&self, queue: &str, message: &DocIngestedMessage) -> Result<()>;

    /// Pull the next available message from `queue`, if any. Returns
    /// `Ok(None)` when the queue is currently empty (callers should poll
    /// with their own backoff/interval).
    async fn receive(&self, queue: &str) -> Result<Option<Delivery>>;
}
