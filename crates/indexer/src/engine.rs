//! Indexing engine (C7, spec §4.7): consumes `index.request`, tokenizes the
//! ingested document's body, and updates the distributed index.

use alexandria_bus::{Delivery, MessageBus};
use alexandria_core::error::{Error, Result};
use alexandria_core::tokenize::term_positions;
use alexandria_core::types::IndexRequestMessage;
use alexandria_index::IndexTransport;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// The 1s poll timeout spec §4.9 also uses for the work queue's worker
/// loop; reused here for the bus consumer's idle-poll interval.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, PartialEq, Eq)]
pub enum ProcessOutcome {
    Indexed { terms_indexed: usize },
    DuplicateSkipped,
    FileMissing,
}

pub struct IndexingEngine {
    transport: Arc<dyn IndexTransport>,
    datalake_root: PathBuf,
}

impl IndexingEngine {
    pub fn new(transport: Arc<dyn IndexTransport>, datalake_root: impl Into<PathBuf>) -> Self {
        Self { transport, datalake_root: datalake_root.into() }
    }

    /// Runs the pipeline in spec §4.7 for one message. Does not ack or
    /// requeue — callers decide based on the returned outcome vs. error,
    /// matching the failure semantics table: file-missing and duplicate
    /// both still ack (redelivery would not help); an `Err` here is a
    /// transient failure that should be redelivered.
    pub async fn process(&self, message: &IndexRequestMessage) -> Result<ProcessOutcome> {
        let idempotency_key = message.idempotency_key();

        if self.transport.is_processed(&idempotency_key).await? {
            info!(book_id = message.book_id, "duplicate index.request skipped");
            return Ok(ProcessOutcome::DuplicateSkipped);
        }

        let body_path = self.body_path(&message.datalake_path);
        let body = match tokio::fs::read_to_string(&body_path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(book_id = message.book_id, path = %body_path.display(), "body file missing, not reprocessing");
                return Ok(ProcessOutcome::FileMissing);
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let positions = term_positions(&body);
        let terms_indexed = self.transport.index_document(message.book_id, &positions).await?;
        self.transport.mark_processed(&idempotency_key).await?;

        info!(book_id = message.book_id, terms_indexed, "indexed document");
        Ok(ProcessOutcome::Indexed { terms_indexed })
    }

    fn body_path(&self, relative_path: &str) -> PathBuf {
        Path::new(&self.datalake_root).join(relative_path).join("body.txt")
    }

    /// Pulls and processes one message from `queue`, if any is available.
    /// Acks on every outcome except a processing error, which leaves the
    /// message for redelivery. Returns `None` when the queue is empty.
    pub async fn run_once(&self, bus: &dyn MessageBus, queue: &str) -> Result<Option<ProcessOutcome>> {
        let Some(delivery) = bus.receive(queue).await? else {
            return Ok(None);
        };
        let Delivery { message, .. } = &delivery;
        match self.process(message).await {
            Ok(outcome) => {
                delivery.ack().await?;
                Ok(Some(outcome))
            }
            Err(e) => {
                warn!(book_id = message.book_id, error = %e, "indexing failed, requeuing");
                delivery.requeue().await?;
                Err(e)
            }
        }
    }

    /// Consumer loop: polls `queue` until `stop` is set, sleeping
    /// [`POLL_INTERVAL`] whenever the queue is empty, per spec §5's
    /// cooperative-stop-flag cancellation model.
    pub async fn run_consumer_loop(self: Arc<Self>, bus: Arc<dyn MessageBus>, queue: String, stop: Arc<AtomicBool>) {
        while !stop.load(Ordering::Relaxed) {
            match self.run_once(&*bus, &queue).await {
                Ok(Some(_)) => {}
                Ok(None) => sleep(POLL_INTERVAL).await,
                Err(_) => sleep(POLL_INTERVAL).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alexandria_bus::InMemoryBus;
    use alexandria_core::types::IndexRequestMessage;
    use alexandria_index::{InvertedIndex, LocalIndexTransport, PartitionTable};

    fn engine_over(root: &Path) -> IndexingEngine {
        let transport = LocalIndexTransport::new(
            Arc::new(InvertedIndex::new()),
            PartitionTable::new(Vec::new(), 0),
        );
        IndexingEngine::new(Arc::new(transport), root.to_path_buf())
    }

    fn message(book_id: u64, datalake_path: &str) -> IndexRequestMessage {
        IndexRequestMessage {
            book_id,
            node_id: "node-a".to_string(),
            datalake_path: datalake_path.to_string(),
            content_hash: "deadbeef".to_string(),
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn processes_a_fresh_document_and_returns_terms_indexed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("20240101/00/1")).unwrap();
        std::fs::write(dir.path().join("20240101/00/1/body.txt"), "the whale the sea").unwrap();

        let engine = engine_over(dir.path());
        let outcome = engine.process(&message(1, "20240101/00/1")).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::Indexed { terms_indexed: 2 });
    }

    #[tokio::test]
    async fn duplicate_idempotency_key_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("20240101/00/1")).unwrap();
        std::fs::write(dir.path().join("20240101/00/1/body.txt"), "whale sea").unwrap();

        let engine = engine_over(dir.path());
        let msg = message(1, "20240101/00/1");
        engine.process(&msg).await.unwrap();
        let second = engine.process(&msg).await.unwrap();
        assert_eq!(second, ProcessOutcome::DuplicateSkipped);
    }

    #[tokio::test]
    async fn missing_body_file_is_reported_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_over(dir.path());
        let outcome = engine.process(&message(1, "20240101/00/1")).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::FileMissing);
    }

    #[tokio::test]
    async fn run_once_acks_successful_processing_and_drains_the_queue() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("20240101/00/1")).unwrap();
        std::fs::write(dir.path().join("20240101/00/1/body.txt"), "whale sea").unwrap();

        let engine = engine_over(dir.path());
        let bus = InMemoryBus::new();
        bus.publish(alexandria_bus::INDEX_REQUEST_QUEUE, &message(1, "20240101/00/1")).await.unwrap();

        let outcome = engine.run_once(&bus, alexandria_bus::INDEX_REQUEST_QUEUE).await.unwrap();
        assert!(outcome.is_some());
        assert_eq!(bus.pending(alexandria_bus::INDEX_REQUEST_QUEUE), 0);
    }

    #[tokio::test]
    async fn run_once_on_empty_queue_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_over(dir.path());
        let bus = InMemoryBus::new();
        let outcome = engine.run_once(&bus, alexandria_bus::INDEX_REQUEST_QUEUE).await.unwrap();
        assert!(outcome.is_none());
    }
}
