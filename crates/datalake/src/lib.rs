//! Content-addressed local datalake partition (C2) and header/body
//! splitter (C3). Content hashing itself (C1) lives in `alexandria_core::hash`
//! since it's a pure, stateless function shared by the whole workspace.

pub mod partition;
pub mod splitter;

pub use partition::{DatalakeStats, IngestOutcome, LocalDatalake};
pub use splitter::{extract_metadata, split, DocumentMetadata, SplitDocument};
