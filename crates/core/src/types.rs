//! Core data model (spec §3) and the wire shapes for the two bound external
//! interfaces: the replication endpoint and the message bus payload
//! (spec §6a/§6b).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable book identifier, assigned by the upstream `DocumentSource`.
pub type BookId = u64;

/// 64-char lowercase hex SHA-256, see [`crate::hash::hash`].
pub type ContentHash = String;

/// Unique identifier of a cluster node, e.g. `"node-a"`.
pub type NodeId = String;

/// `bookId:contentHash` — guards against duplicate indexing on redelivery.
pub type IdempotencyKey = String;

// ---------------------------------------------------------------------------
// Document & ingestion log
// ---------------------------------------------------------------------------

/// The three byte blobs that make up one locally stored document version.
#[derive(Debug, Clone)]
pub struct DocumentBytes {
    pub raw: Vec<u8>,
    pub header: Vec<u8>,
    pub body: Vec<u8>,
}

/// One append-only record in `ingestions.log` (spec §3, §6c).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestionLogEntry {
    pub timestamp: DateTime<Utc>,
    pub book_id: BookId,
    pub relative_path: String,
    pub bytes: u64,
}

/// Outcome of [`crate`]-level ingest operations (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    Downloaded,
    Available,
    Error,
}

// ---------------------------------------------------------------------------
// Postings & index stats
// ---------------------------------------------------------------------------

/// `{bookId, positions}` — one posting per (term, bookId) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub book_id: BookId,
    /// Strictly increasing, 0-indexed against the tokenized body.
    pub positions: Vec<u32>,
}

impl Posting {
    pub fn new(book_id: BookId, positions: Vec<u32>) -> Self {
        Self { book_id, positions }
    }

    /// `termFrequency` ≡ `|positions|`.
    pub fn term_frequency(&self) -> usize {
        self.positions.len()
    }
}

/// `{total_documents, total_terms_indexed}`, updated under a per-key lock.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_documents: u64,
    pub total_terms_indexed: u64,
}

// ---------------------------------------------------------------------------
// External interface (a): replication endpoint, node-to-node
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationRequest {
    pub book_id: BookId,
    pub source_node_id: NodeId,
    pub relative_path: String,
    #[serde(with = "base64_bytes")]
    pub raw_content: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub header_content: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub body_content: Vec<u8>,
    pub content_hash: ContentHash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationResponse {
    pub success: bool,
    pub node_id: NodeId,
    pub book_id: BookId,
    pub message: String,
}

pub mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded.as_bytes()).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// External interface (b): message bus payload
// ---------------------------------------------------------------------------

/// Payload of the `index.request` queue (spec §6b).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRequestMessage {
    pub book_id: BookId,
    pub node_id: NodeId,
    pub datalake_path: String,
    pub content_hash: ContentHash,
    /// Epoch milliseconds, matching the wire shape in spec §6b.
    pub timestamp: i64,
}

impl IndexRequestMessage {
    pub fn idempotency_key(&self) -> IdempotencyKey {
        crate::hash::idempotency_key(self.book_id, &self.content_hash)
    }
}

/// Optional, informational payload for the `doc.ingested` queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocIngestedMessage {
    pub book_id: BookId,
    pub node_id: NodeId,
    pub content_hash: ContentHash,
    pub timestamp: i64,
}

// ---------------------------------------------------------------------------
// Peer ring
// ---------------------------------------------------------------------------

/// Ordered, deterministic list of peer node endpoints known at startup.
#[derive(Debug, Clone, Default)]
pub struct PeerRing {
    pub peers: Vec<String>,
}

impl PeerRing {
    pub fn new(peers: Vec<String>) -> Self {
        Self { peers }
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Book metadata decoration (external collaborator, spec §1)
// ---------------------------------------------------------------------------

/// Record served by the external relational metadata store. The store
/// itself is out of scope; this is the shape callers decorate hits with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookMetadata {
    pub book_id: BookId,
    pub title: Option<String>,
    pub author: Option<String>,
    pub language: Option<String>,
    pub year: Option<i32>,
}
