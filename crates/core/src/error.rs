//! Error taxonomy shared across the cluster (spec §7).
//!
//! Every crate defines its own narrow error where it helps the caller, but
//! all of them fold into this enum at crate boundaries so the node binary
//! can report a single, consistent error surface.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Book or file not found; not retried by the caller.
    #[error("not found: {0}")]
    NotFound(String),

    /// Replica content hash didn't match the sender's claimed hash.
    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    /// Idempotency check short-circuited a redelivered index request.
    #[error("duplicate index request: {0}")]
    DuplicateIndexRequest(String),

    /// Transient network/broker/rebalance failure; caller retries with backoff.
    #[error("transient error: {0}")]
    Transient(String),

    /// Misconfiguration or corrupt state that should abort startup.
    #[error("fatal error: {0}")]
    Fatal(String),

    /// A bus consumer handler failed; the message must not be acked.
    #[error("handler failure: {0}")]
    HandlerFailure(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether the bus consumer loop should let this message redeliver
    /// (i.e. not ack) rather than acking with an error counter bump.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient(_) | Error::HandlerFailure(_))
    }
}
