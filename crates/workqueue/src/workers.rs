//! Per-node worker pool draining a [`WorkQueue`] (spec §4.9 `startWorkers`
//! / `stopWorkers`).

use crate::queue::WorkQueue;
use alexandria_core::error::Result;
use alexandria_core::types::BookId;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::warn;

const POLL_TIMEOUT: Duration = Duration::from_secs(1);
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// The bulk-ingest workload a worker applies to each polled `bookId`; in
/// the reference binary this wraps `LocalDatalake::ingest`.
#[async_trait]
pub trait Ingestor: Send + Sync {
    async fn ingest(&self, book_id: BookId) -> Result<()>;
}

/// A running set of worker tasks draining one [`WorkQueue`]. Dropping this
/// without calling [`WorkerPool::stop`] leaves the tasks running —
/// `stop` is the documented way to shut them down.
pub struct WorkerPool {
    stop_flag: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `pool_size` tasks, each looping: poll (up to [`POLL_TIMEOUT`]),
    /// ingest, record processed/errors under `node_id`; the first worker to
    /// observe an empty queue while the run is still `Running` completes it.
    pub fn start(queue: Arc<WorkQueue>, ingestor: Arc<dyn Ingestor>, node_id: String, pool_size: usize) -> Self {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let handles = (0..pool_size)
            .map(|_| {
                let queue = queue.clone();
                let ingestor = ingestor.clone();
                let node_id = node_id.clone();
                let stop_flag = stop_flag.clone();
                tokio::spawn(async move { worker_loop(queue, ingestor, node_id, stop_flag).await })
            })
            .collect();
        Self { stop_flag, handles }
    }

    /// Signals every worker to stop and waits up to [`DRAIN_TIMEOUT`] for
    /// them to finish their current iteration before returning. Workers
    /// that don't finish in time are abandoned (their tasks are dropped,
    /// which aborts them).
    pub async fn stop(self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        let drain = futures_join_all(self.handles);
        if timeout(DRAIN_TIMEOUT, drain).await.is_err() {
            warn!("worker pool did not drain within the timeout, forcing shutdown");
        }
    }
}

async fn futures_join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        let _ = handle.await;
    }
}

async fn worker_loop(queue: Arc<WorkQueue>, ingestor: Arc<dyn Ingestor>, node_id: String, stop_flag: Arc<AtomicBool>) {
    while !stop_flag.load(Ordering::Relaxed) {
        match queue.poll() {
            Some(book_id) => match ingestor.ingest(book_id).await {
                Ok(()) => queue.record_processed(&node_id),
                Err(e) => {
                    warn!(book_id, node_id = %node_id, error = %e, "bulk ingest failed");
                    queue.record_error(&node_id);
                }
            },
            None => {
                queue.maybe_complete();
                sleep(POLL_TIMEOUT).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingIngestor {
        calls: AtomicUsize,
        fail_book_id: Option<BookId>,
    }

    #[async_trait]
    impl Ingestor for CountingIngestor {
        async fn ingest(&self, book_id: BookId) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(book_id) == self.fail_book_id {
                return Err(alexandria_core::error::Error::Transient("boom".into()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn pool_drains_the_queue_and_completes() {
        let queue = Arc::new(WorkQueue::new());
        queue.start("bench-1", 5, None);
        let ingestor = Arc::new(CountingIngestor { calls: AtomicUsize::new(0), fail_book_id: None });

        let pool = WorkerPool::start(queue.clone(), ingestor.clone(), "node-a".to_string(), 2);
        // give workers enough iterations to drain a 5-item queue and observe completion
        sleep(Duration::from_millis(1300)).await;
        pool.stop().await;

        assert_eq!(queue.status().total_processed, 5);
        assert_eq!(queue.status().stats.status, crate::queue::Status::Completed);
    }

    #[tokio::test]
    async fn failed_ingest_is_recorded_as_an_error_not_a_panic() {
        let queue = Arc::new(WorkQueue::new());
        queue.start("bench-1", 1, None);
        let ingestor = Arc::new(CountingIngestor { calls: AtomicUsize::new(0), fail_book_id: Some(1) });

        let pool = WorkerPool::start(queue.clone(), ingestor, "node-a".to_string(), 1);
        sleep(Duration::from_millis(200)).await;
        pool.stop().await;

        assert_eq!(queue.status().total_errors, 1);
        assert_eq!(queue.status().total_processed, 0);
    }
}
