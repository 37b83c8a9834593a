//! Distributed inverted index (C6, spec §4.6).

pub mod partition;
pub mod store;
pub mod transport;

pub use partition::{partition_for, PartitionTable, PARTITION_COUNT};
pub use store::InvertedIndex;
pub use transport::{IndexTransport, LocalIndexTransport};
