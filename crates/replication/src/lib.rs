//! Replication transport (C4): hash-ring peer placement plus the outbound
//! HTTP client that pushes a book's bytes to its replica set. The
//! receiving side (hash verification + datalake write) lives in
//! `alexandria_datalake::partition::LocalDatalake::receive_replica`; the
//! axum handler that exposes it over HTTP lives in the `server` binary.

pub mod ring;
pub mod transport;

pub use ring::select_peers;
pub use transport::{count_successes, ReplicationClient};
