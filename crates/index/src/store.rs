//! The inverted index itself (spec §4.6): `term -> postings`, a stats map,
//! and the processed-documents dedup map, all under per-key synchronization.

use alexandria_core::types::{BookId, IdempotencyKey, IndexStats, Posting};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

/// One term's postings, keyed by `bookId` so "remove old posting, add new
/// one" for a given book is a single-key operation regardless of how many
/// other books share the term.
type TermEntry = DashMap<BookId, Posting>;

/// Advisory per-term lock (spec §4.6 `lock`/`unlock`). Acquired around any
/// read-modify-write that must be serialized against concurrent indexers
/// for the same term; `indexDocument`'s batched fast path does not need it
/// (see module docs on why), but [`InvertedIndex::remove_document`] and
/// callers upgrading to per-term locking for hot terms do.
pub struct TermLock {
    _guard: tokio::sync::OwnedMutexGuard<()>,
}

/// Concurrent, in-process inverted index. A single [`InvertedIndex`] backs
/// one partition owner's share of the term space; cluster-wide fan-out
/// across partitions is the job of [`crate::transport::IndexTransport`].
pub struct InvertedIndex {
    entries: DashMap<String, TermEntry>,
    term_locks: DashMap<String, Arc<AsyncMutex<()>>>,
    total_documents: AtomicU64,
    total_terms_indexed: AtomicU64,
    processed: DashMap<IdempotencyKey, DateTime<Utc>>,
    /// `bookId -> term count at last index`, so `removeDocument` can
    /// decrement both `total_documents` and `total_terms_indexed` exactly
    /// once per book, and a reindex can replace rather than add to its own
    /// prior contribution to `total_terms_indexed`.
    documents_present: DashMap<BookId, usize>,
}

impl Default for InvertedIndex {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            term_locks: DashMap::new(),
            total_documents: AtomicU64::new(0),
            total_terms_indexed: AtomicU64::new(0),
            processed: DashMap::new(),
            documents_present: DashMap::new(),
        }
    }
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, term: &str) -> Vec<Posting> {
        self.entries
            .get(term)
            .map(|entry| entry.iter().map(|r| r.value().clone()).collect())
            .unwrap_or_default()
    }

    /// Batch variant. The spec requires one request per *owning node*, not
    /// per term; the node-fan-out lives in [`crate::transport`] — this
    /// method is what runs once a request has already landed on the right
    /// node.
    pub fn get_all(&self, terms: &[String]) -> BTreeMap<String, Vec<Posting>> {
        terms.iter().map(|t| (t.clone(), self.get(t))).collect()
    }

    /// Batch write; coalesced per owning node by the caller.
    pub fn put_all(&self, updates: BTreeMap<String, Vec<Posting>>) {
        for (term, postings) in updates {
            let entry = self.entries.entry(term).or_default();
            entry.clear();
            for posting in postings {
                entry.insert(posting.book_id, posting);
            }
        }
    }

    /// Acquires the advisory lock for `term`, blocking until available.
    pub async fn lock(&self, term: &str) -> TermLock {
        let mutex = self
            .term_locks
            .entry(term.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;
        TermLock { _guard: guard }
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.term_locks.clear();
        self.processed.clear();
        self.documents_present.clear();
        self.total_documents.store(0, Ordering::SeqCst);
        self.total_terms_indexed.store(0, Ordering::SeqCst);
    }

    /// Indexes one document's term positions (spec §4.6 `indexDocument`):
    /// batch-fetch, replace this book's posting per term, batch-put, then
    /// update the stats counters. Returns the number of distinct terms
    /// indexed.
    pub fn index_document(&self, book_id: BookId, term_positions: &BTreeMap<String, Vec<u32>>) -> usize {
        let terms: Vec<String> = term_positions.keys().cloned().collect();
        let current = self.get_all(&terms);

        let mut merged = BTreeMap::new();
        for (term, positions) in term_positions {
            let mut postings: Vec<Posting> = current
                .get(term)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .filter(|p| p.book_id != book_id)
                .collect();
            postings.push(Posting::new(book_id, positions.clone()));
            merged.insert(term.clone(), postings);
        }

        self.put_all(merged);

        let new_term_count = terms.len() as u64;
        match self.documents_present.insert(book_id, terms.len()) {
            None => {
                self.total_documents.fetch_add(1, Ordering::SeqCst);
                self.total_terms_indexed.fetch_add(new_term_count, Ordering::SeqCst);
            }
            Some(previous_term_count) => {
                let previous_term_count = previous_term_count as u64;
                if new_term_count >= previous_term_count {
                    self.total_terms_indexed.fetch_add(new_term_count - previous_term_count, Ordering::SeqCst);
                } else {
                    self.total_terms_indexed.fetch_sub(previous_term_count - new_term_count, Ordering::SeqCst);
                }
            }
        }

        debug!(book_id, terms = terms.len(), "indexed document");
        terms.len()
    }

    /// Removes every posting for `book_id`, deleting now-empty term entries,
    /// serialized per term via [`InvertedIndex::lock`].
    pub async fn remove_document(&self, book_id: BookId) {
        let terms: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        for term in terms {
            let _lock = self.lock(&term).await;
            if let Some(entry) = self.entries.get(&term) {
                entry.remove(&book_id);
                if entry.is_empty() {
                    drop(entry);
                    self.entries.remove(&term);
                }
            }
        }
        if let Some((_, term_count)) = self.documents_present.remove(&book_id) {
            self.total_documents.fetch_sub(1, Ordering::SeqCst);
            self.total_terms_indexed.fetch_sub(term_count as u64, Ordering::SeqCst);
        }
    }

    pub fn is_processed(&self, key: &str) -> bool {
        self.processed.contains_key(key)
    }

    pub fn mark_processed(&self, key: &str, now: DateTime<Utc>) {
        self.processed.entry(key.to_string()).or_insert(now);
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            total_documents: self.total_documents.load(Ordering::SeqCst),
            total_terms_indexed: self.total_terms_indexed.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(map: &[(&str, &[u32])]) -> BTreeMap<String, Vec<u32>> {
        map.iter().map(|(t, p)| (t.to_string(), p.to_vec())).collect()
    }

    #[test]
    fn get_on_unknown_term_is_empty() {
        let index = InvertedIndex::new();
        assert!(index.get("whale").is_empty());
    }

    #[test]
    fn index_document_creates_one_posting_per_term() {
        let index = InvertedIndex::new();
        let terms = positions(&[("whale", &[0, 5]), ("sea", &[1])]);
        let count = index.index_document(1, &terms);
        assert_eq!(count, 2);
        assert_eq!(index.get("whale"), vec![Posting::new(1, vec![0, 5])]);
        assert_eq!(index.get("sea"), vec![Posting::new(1, vec![1])]);
    }

    #[test]
    fn reindexing_same_book_replaces_its_posting_atomically() {
        let index = InvertedIndex::new();
        index.index_document(1, &positions(&[("whale", &[0])]));
        index.index_document(1, &positions(&[("whale", &[0, 9])]));
        let postings = index.get("whale");
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].positions, vec![0, 9]);
    }

    #[test]
    fn indexing_two_books_keeps_both_postings_for_shared_term() {
        let index = InvertedIndex::new();
        index.index_document(1, &positions(&[("whale", &[0])]));
        index.index_document(2, &positions(&[("whale", &[3])]));
        let mut postings = index.get("whale");
        postings.sort_by_key(|p| p.book_id);
        assert_eq!(postings.len(), 2);
        assert_eq!(postings[0].book_id, 1);
        assert_eq!(postings[1].book_id, 2);
    }

    #[test]
    fn stats_count_distinct_documents_not_cumulative_indexing_calls() {
        let index = InvertedIndex::new();
        index.index_document(1, &positions(&[("whale", &[0])]));
        index.index_document(1, &positions(&[("whale", &[0, 1])]));
        assert_eq!(index.stats().total_documents, 1);
    }

    #[test]
    fn reindexing_with_fewer_terms_shrinks_total_terms_indexed() {
        let index = InvertedIndex::new();
        index.index_document(1, &positions(&[("whale", &[0]), ("sea", &[1]), ("deep", &[2])]));
        assert_eq!(index.stats().total_terms_indexed, 3);
        index.index_document(1, &positions(&[("whale", &[0])]));
        assert_eq!(index.stats().total_terms_indexed, 1);
    }

    #[test]
    fn reindexing_with_more_terms_grows_total_terms_indexed() {
        let index = InvertedIndex::new();
        index.index_document(1, &positions(&[("whale", &[0])]));
        assert_eq!(index.stats().total_terms_indexed, 1);
        index.index_document(1, &positions(&[("whale", &[0]), ("sea", &[1])]));
        assert_eq!(index.stats().total_terms_indexed, 2);
    }

    #[tokio::test]
    async fn remove_document_deletes_empty_entries_and_decrements_stats() {
        let index = InvertedIndex::new();
        index.index_document(1, &positions(&[("whale", &[0])]));
        index.index_document(2, &positions(&[("whale", &[3])]));

        index.remove_document(1).await;

        let postings = index.get("whale");
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].book_id, 2);
        assert_eq!(index.stats().total_documents, 1);
        assert_eq!(index.stats().total_terms_indexed, 1);
    }

    #[tokio::test]
    async fn remove_document_drops_term_entirely_when_it_empties_out() {
        let index = InvertedIndex::new();
        index.index_document(1, &positions(&[("whale", &[0])]));
        index.remove_document(1).await;
        assert!(index.get("whale").is_empty());
    }

    #[test]
    fn clear_resets_entries_stats_and_processed_map() {
        let index = InvertedIndex::new();
        index.index_document(1, &positions(&[("whale", &[0])]));
        index.mark_processed("1:deadbeef", Utc::now());
        index.clear();
        assert!(index.get("whale").is_empty());
        assert_eq!(index.stats().total_documents, 0);
        assert!(!index.is_processed("1:deadbeef"));
    }

    #[test]
    fn is_processed_reflects_mark_processed() {
        let index = InvertedIndex::new();
        assert!(!index.is_processed("1:deadbeef"));
        index.mark_processed("1:deadbeef", Utc::now());
        assert!(index.is_processed("1:deadbeef"));
    }

    #[tokio::test]
    async fn term_lock_serializes_concurrent_acquirers() {
        let index = Arc::new(InvertedIndex::new());
        let first = index.lock("whale").await;
        let index2 = index.clone();
        let handle = tokio::spawn(async move {
            let _second = index2.lock("whale").await;
        });
        tokio::task::yield_now().await;
        assert!(!handle.is_finished());
        drop(first);
        handle.await.unwrap();
    }
}
