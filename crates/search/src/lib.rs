//! Search engine (C8, spec §4.8).

pub mod engine;

pub use engine::{search, MetadataFilters, MetadataStore, QueryMode, SearchHit};
