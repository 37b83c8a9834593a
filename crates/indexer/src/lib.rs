//! Indexing engine (C7, spec §4.7).

pub mod engine;

pub use engine::{IndexingEngine, ProcessOutcome};
