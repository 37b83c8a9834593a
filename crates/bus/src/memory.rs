//! In-process [`MessageBus`] test double with the same at-least-once,
//! ack-or-requeue contract as [`crate::amqp::AmqpBus`]. Used by the indexer's
//! own unit tests and by the `server` crate's end-to-end cluster tests.

use crate::{Delivery, DeliveryHandle, MessageBus};
use alexandria_core::error::{Error, Result};
use alexandria_core::types::{DocIngestedMessage, IndexRequestMessage};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

type Queues = Arc<DashMap<String, Mutex<VecDeque<IndexRequestMessage>>>>;

#[derive(Default)]
pub struct InMemoryBus {
    queues: Queues,
    ingested: DashMap<String, Mutex<VecDeque<DocIngestedMessage>>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `index.request` messages currently sitting in `queue`,
    /// including ones out on delivery that haven't been acked yet.
    pub fn pending(&self, queue: &str) -> usize {
        self.queues.get(queue).map(|q| q.lock().unwrap().len()).unwrap_or(0)
    }

    pub fn ingested_events(&self, queue: &str) -> Vec<DocIngestedMessage> {
        self.ingested
            .get(queue)
            .map(|q| q.lock().unwrap().iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, queue: &str, message: &IndexRequestMessage) -> Result<()> {
        self.queues
            .entry(queue.to_string())
            .or_default()
            .lock()
            .unwrap()
            .push_back(message.clone());
        Ok(())
    }

    async fn publish_ingested(&self, queue: &str, message: &DocIngestedMessage) -> Result<()> {
        self.ingested
            .entry(queue.to_string())
            .or_default()
            .lock()
            .unwrap()
            .push_back(message.clone());
        Ok(())
    }

    async fn receive(&self, queue: &str) -> Result<Option<Delivery>> {
        let entry = self.queues.entry(queue.to_string()).or_default();
        let message = entry.lock().unwrap().pop_front();
        drop(entry);
        match message {
            Some(message) => {
                let handle = InMemoryDeliveryHandle {
                    queue: queue.to_string(),
                    message: message.clone(),
                    queues: Arc::clone(&self.queues),
                };
                Ok(Some(Delivery::new(message, Box::new(handle))))
            }
            None => Ok(None),
        }
    }
}

struct InMemoryDeliveryHandle {
    queue: String,
    message: IndexRequestMessage,
    queues: Queues,
}

#[async_trait]
impl DeliveryHandle for InMemoryDeliveryHandle {
    async fn ack(self: Box<Self>) -> Result<()> {
        Ok(())
    }

    async fn requeue(self: Box<Self>) -> Result<()> {
        self.queues
            .entry(self.queue.clone())
            .or_default()
            .lock()
            .map_err(|_| Error::Fatal("in-memory bus queue lock poisoned".to_string()))?
            .push_back(self.message.clone());
        Ok(())
    }
}
