//! Cluster-shared bulk-ingest work queue (C9, spec §4.9).

pub mod queue;
pub mod workers;

pub use queue::{BenchmarkStats, NodeProgress, Status, StatusReport, WorkQueue};
pub use workers::{Ingestor, WorkerPool};
