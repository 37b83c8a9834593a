//! Cluster-shared bulk-ingest FIFO plus the `stats`/`progress` maps (spec
//! §4.9). One [`WorkQueue`] is shared by every worker task on a node; in a
//! real cluster deployment the queue and maps themselves would live behind
//! the same kind of networked transport the index uses, but the spec binds
//! only their observable semantics, not their wire format.

use alexandria_core::types::BookId;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Idle,
    Running,
    Completed,
}

#[derive(Debug, Clone, Default)]
pub struct BenchmarkStats {
    pub benchmark_id: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_books: u64,
    pub status: Status,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NodeProgress {
    pub processed: u64,
    pub errors: u64,
}

#[derive(Debug, Clone)]
pub struct StatusReport {
    pub stats: BenchmarkStats,
    pub progress: Vec<(String, NodeProgress)>,
    pub total_processed: u64,
    pub total_errors: u64,
    /// Books processed per second, `0.0` before any elapsed time has passed.
    pub throughput: f64,
}

pub struct WorkQueue {
    queue: Mutex<VecDeque<BookId>>,
    stats: Mutex<BenchmarkStats>,
    progress: DashMap<String, (AtomicU64, AtomicU64)>,
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            stats: Mutex::new(BenchmarkStats::default()),
            progress: DashMap::new(),
        }
    }
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the queue, stats, and progress, then enqueues `n` book ids —
    /// sequential `1..=n` unless `curated` supplies a known-valid list to
    /// draw the first `n` ids from.
    pub fn start(&self, benchmark_id: impl Into<String>, n: u64, curated: Option<&[BookId]>) {
        let ids: Vec<BookId> = match curated {
            Some(list) => list.iter().take(n as usize).copied().collect(),
            None => (1..=n).collect(),
        };

        *self.queue.lock().unwrap() = ids.into_iter().collect();
        self.progress.clear();
        *self.stats.lock().unwrap() = BenchmarkStats {
            benchmark_id: benchmark_id.into(),
            start_time: Some(Utc::now()),
            end_time: None,
            total_books: n,
            status: Status::Running,
        };
    }

    pub fn poll(&self) -> Option<BookId> {
        self.queue.lock().unwrap().pop_front()
    }

    pub fn record_processed(&self, node_id: &str) {
        self.progress.entry(node_id.to_string()).or_default().0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_error(&self, node_id: &str) {
        self.progress.entry(node_id.to_string()).or_default().1.fetch_add(1, Ordering::SeqCst);
    }

    /// If the queue is empty and the run is still marked running, marks it
    /// completed and stamps `end_time`. Returns `true` only for the caller
    /// that performs the transition — a compare-and-set guarding against
    /// every worker racing to finish at once.
    pub fn maybe_complete(&self) -> bool {
        if !self.queue.lock().unwrap().is_empty() {
            return false;
        }
        let mut stats = self.stats.lock().unwrap();
        if stats.status != Status::Running {
            return false;
        }
        stats.status = Status::Completed;
        stats.end_time = Some(Utc::now());
        true
    }

    pub fn status(&self) -> StatusReport {
        let stats = self.stats.lock().unwrap().clone();
        let progress: Vec<(String, NodeProgress)> = self
            .progress
            .iter()
            .map(|entry| {
                let (processed, errors) = entry.value();
                (entry.key().clone(), NodeProgress {
                    processed: processed.load(Ordering::SeqCst),
                    errors: errors.load(Ordering::SeqCst),
                })
            })
            .collect();

        let total_processed: u64 = progress.iter().map(|(_, p)| p.processed).sum();
        let total_errors: u64 = progress.iter().map(|(_, p)| p.errors).sum();

        let elapsed_ms = match (stats.start_time, stats.end_time.or(Some(Utc::now()))) {
            (Some(start), Some(end)) => (end - start).num_milliseconds().max(0) as u64,
            _ => 0,
        };
        let throughput = if elapsed_ms > 0 {
            (total_processed as f64) * 1000.0 / (elapsed_ms as f64)
        } else {
            0.0
        };

        StatusReport { stats, progress, total_processed, total_errors, throughput }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_enqueues_sequential_ids_by_default() {
        let queue = WorkQueue::new();
        queue.start("bench-1", 3, None);
        assert_eq!(queue.poll(), Some(1));
        assert_eq!(queue.poll(), Some(2));
        assert_eq!(queue.poll(), Some(3));
        assert_eq!(queue.poll(), None);
    }

    #[test]
    fn start_draws_from_curated_list_when_given() {
        let queue = WorkQueue::new();
        queue.start("bench-1", 2, Some(&[100, 200, 300]));
        assert_eq!(queue.poll(), Some(100));
        assert_eq!(queue.poll(), Some(200));
        assert_eq!(queue.poll(), None);
    }

    #[test]
    fn start_resets_progress_and_stats_from_a_prior_run() {
        let queue = WorkQueue::new();
        queue.start("bench-1", 1, None);
        queue.record_processed("node-a");
        queue.start("bench-2", 1, None);
        assert_eq!(queue.status().total_processed, 0);
        assert_eq!(queue.status().stats.benchmark_id, "bench-2");
    }

    #[test]
    fn maybe_complete_transitions_only_once() {
        let queue = WorkQueue::new();
        queue.start("bench-1", 1, None);
        queue.poll();
        assert!(queue.maybe_complete());
        assert!(!queue.maybe_complete());
        assert_eq!(queue.status().stats.status, Status::Completed);
    }

    #[test]
    fn status_aggregates_across_nodes() {
        let queue = WorkQueue::new();
        queue.start("bench-1", 4, None);
        queue.record_processed("node-a");
        queue.record_processed("node-b");
        queue.record_error("node-a");
        let status = queue.status();
        assert_eq!(status.total_processed, 2);
        assert_eq!(status.total_errors, 1);
    }
}
