//! Cluster-facing seam in front of [`crate::store::InvertedIndex`].
//!
//! `spec.md` binds the wire shape of the replication endpoint, the bus
//! payload, and the datalake layout, but leaves the index's own inter-node
//! transport unspecified. [`IndexTransport`] models that transport: given a
//! partition's owning node id (from [`crate::partition::PartitionTable`]),
//! it fetches or writes that partition's postings. [`LocalIndexTransport`]
//! is the only implementation this workspace ships — it applies every
//! operation in-process, which is exact for a single-node deployment and
//! for tests; a networked implementation can be swapped in without
//! changing [`crate::store::InvertedIndex`] or callers in `alexandria-indexer`
//! / `alexandria-search`.

use crate::partition::{partition_for, PartitionTable};
use crate::store::InvertedIndex;
use alexandria_core::error::Result;
use alexandria_core::types::Posting;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

#[async_trait]
pub trait IndexTransport: Send + Sync {
    async fn get(&self, term: &str) -> Result<Vec<Posting>>;
    async fn get_all(&self, terms: &[String]) -> Result<BTreeMap<String, Vec<Posting>>>;
    async fn put_all(&self, updates: BTreeMap<String, Vec<Posting>>) -> Result<()>;
    async fn index_document(&self, book_id: u64, term_positions: &BTreeMap<String, Vec<u32>>) -> Result<usize>;
    async fn remove_document(&self, book_id: u64) -> Result<()>;
    async fn is_processed(&self, key: &str) -> Result<bool>;
    async fn mark_processed(&self, key: &str) -> Result<()>;
    async fn clear(&self) -> Result<()>;
    async fn stats(&self) -> Result<alexandria_core::types::IndexStats>;
}

pub struct LocalIndexTransport {
    index: Arc<InvertedIndex>,
    partitions: PartitionTable,
}

impl LocalIndexTransport {
    pub fn new(index: Arc<InvertedIndex>, partitions: PartitionTable) -> Self {
        Self { index, partitions }
    }

    /// Owning node for `term`, per the configured partition table. Informational
    /// in the local transport (every operation runs in-process regardless),
    /// but exposed so callers and tests can assert placement matches the
    /// cluster's declared membership.
    pub fn owner_of(&self, term: &str) -> Option<&str> {
        self.partitions.primary(partition_for(term))
    }
}

#[async_trait]
impl IndexTransport for LocalIndexTransport {
    async fn get(&self, term: &str) -> Result<Vec<Posting>> {
        Ok(self.index.get(term))
    }

    async fn get_all(&self, terms: &[String]) -> Result<BTreeMap<String, Vec<Posting>>> {
        Ok(self.index.get_all(terms))
    }

    async fn put_all(&self, updates: BTreeMap<String, Vec<Posting>>) -> Result<()> {
        self.index.put_all(updates);
        Ok(())
    }

    async fn index_document(&self, book_id: u64, term_positions: &BTreeMap<String, Vec<u32>>) -> Result<usize> {
        Ok(self.index.index_document(book_id, term_positions))
    }

    async fn remove_document(&self, book_id: u64) -> Result<()> {
        self.index.remove_document(book_id).await;
        Ok(())
    }

    async fn is_processed(&self, key: &str) -> Result<bool> {
        Ok(self.index.is_processed(key))
    }

    async fn mark_processed(&self, key: &str) -> Result<()> {
        self.index.mark_processed(key, chrono::Utc::now());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.index.clear();
        Ok(())
    }

    async fn stats(&self) -> Result<alexandria_core::types::IndexStats> {
        Ok(self.index.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alexandria_core::types::Posting;

    fn transport() -> LocalIndexTransport {
        LocalIndexTransport::new(
            Arc::new(InvertedIndex::new()),
            PartitionTable::new(vec!["node-a".into(), "node-b".into()], 1),
        )
    }

    #[tokio::test]
    async fn index_document_then_get_round_trips() {
        let transport = transport();
        let terms = BTreeMap::from([("whale".to_string(), vec![0, 2])]);
        transport.index_document(1, &terms).await.unwrap();
        assert_eq!(transport.get("whale").await.unwrap(), vec![Posting::new(1, vec![0, 2])]);
    }

    #[tokio::test]
    async fn owner_of_is_stable_for_the_same_term() {
        let transport = transport();
        assert_eq!(transport.owner_of("whale"), transport.owner_of("whale"));
    }

    #[tokio::test]
    async fn clear_empties_the_underlying_index() {
        let transport = transport();
        let terms = BTreeMap::from([("whale".to_string(), vec![0])]);
        transport.index_document(1, &terms).await.unwrap();
        transport.clear().await.unwrap();
        assert!(transport.get("whale").await.unwrap().is_empty());
    }
}
