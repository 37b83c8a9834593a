//! Search engine (C8, spec §4.8): query tokenization, boolean candidate
//! selection, TF·IDF ranking, and metadata decoration.

use alexandria_core::error::Result;
use alexandria_core::tokenize::tokenize;
use alexandria_core::types::{BookId, BookMetadata, Posting};
use alexandria_index::IndexTransport;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    And,
    Or,
}

#[derive(Debug, Clone, Default)]
pub struct MetadataFilters {
    pub author: Option<String>,
    pub language: Option<String>,
    pub year: Option<i32>,
}

impl MetadataFilters {
    fn matches(&self, metadata: &BookMetadata) -> bool {
        if let Some(author) = &self.author {
            let needle = author.to_lowercase();
            match &metadata.author {
                Some(actual) if actual.to_lowercase().contains(&needle) => {}
                _ => return false,
            }
        }
        if let Some(language) = &self.language {
            let wanted = language.to_lowercase();
            match &metadata.language {
                Some(actual) => {
                    let actual = actual.to_lowercase();
                    if actual != wanted && !actual.starts_with(&wanted) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        if let Some(year) = self.year {
            if metadata.year != Some(year) {
                return false;
            }
        }
        true
    }
}

/// External collaborator that owns book metadata; the index only knows
/// `bookId`s and term postings.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn lookup(&self, book_id: BookId) -> Result<Option<BookMetadata>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub book_id: BookId,
    pub score: f64,
    pub metadata: Option<BookMetadata>,
}

/// Executes spec §4.8's ranking algorithm against one partition's postings
/// and stats, decorating with `metadata` and applying `filters` afterward.
pub async fn search(
    transport: &dyn IndexTransport,
    metadata: &dyn MetadataStore,
    raw_query: &str,
    mode: QueryMode,
    limit: usize,
    filters: &MetadataFilters,
) -> Result<Vec<SearchHit>> {
    let terms: Vec<String> = {
        let mut seen = BTreeSet::new();
        tokenize(raw_query)
            .into_iter()
            .map(|(term, _)| term)
            .filter(|term| seen.insert(term.clone()))
            .collect()
    };
    if terms.is_empty() {
        return Ok(Vec::new());
    }

    let postings_by_term = transport.get_all(&terms).await?;
    let total_documents = transport.stats().await?.total_documents;

    let idf: BTreeMap<&str, f64> = terms
        .iter()
        .map(|t| {
            let df = postings_by_term.get(t).map(Vec::len).unwrap_or(0);
            (t.as_str(), idf_of(total_documents, df))
        })
        .collect();

    let candidates = candidate_book_ids(&terms, &postings_by_term, mode);

    let mut scored: Vec<(BookId, f64)> = candidates
        .into_iter()
        .map(|book_id| {
            let score = terms
                .iter()
                .filter_map(|term| {
                    let postings = postings_by_term.get(term)?;
                    let posting = postings.iter().find(|p| p.book_id == book_id)?;
                    let tf = posting.term_frequency() as f64;
                    Some((1.0 + tf.ln()) * idf[term.as_str()])
                })
                .sum();
            (book_id, score)
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
    scored.truncate(limit);

    let mut hits = Vec::with_capacity(scored.len());
    for (book_id, score) in scored {
        let resolved = metadata.lookup(book_id).await?;
        if let Some(meta) = &resolved {
            if !filters.matches(meta) {
                continue;
            }
        } else if filters.author.is_some() || filters.language.is_some() || filters.year.is_some() {
            continue;
        }
        hits.push(SearchHit { book_id, score, metadata: resolved });
    }

    debug!(query = raw_query, hits = hits.len(), "search completed");
    Ok(hits)
}

fn idf_of(total_documents: u64, document_frequency: usize) -> f64 {
    (((total_documents + 1) as f64) / ((document_frequency + 1) as f64)).ln() + 1.0
}

fn candidate_book_ids(terms: &[String], postings_by_term: &BTreeMap<String, Vec<Posting>>, mode: QueryMode) -> Vec<BookId> {
    let book_id_sets: Vec<BTreeSet<BookId>> = terms
        .iter()
        .map(|t| postings_by_term.get(t).into_iter().flatten().map(|p| p.book_id).collect())
        .collect();

    match mode {
        QueryMode::Or => {
            let mut union = BTreeSet::new();
            for set in &book_id_sets {
                union.extend(set);
            }
            union.into_iter().collect()
        }
        QueryMode::And => {
            let mut iter = book_id_sets.into_iter();
            let Some(mut intersection) = iter.next() else {
                return Vec::new();
            };
            for set in iter {
                if intersection.is_empty() {
                    break;
                }
                intersection = intersection.intersection(&set).copied().collect();
            }
            intersection.into_iter().collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alexandria_index::{InvertedIndex, LocalIndexTransport, PartitionTable};
    use std::collections::BTreeMap as Map;
    use std::sync::Arc;

    struct FixedMetadataStore(Map<BookId, BookMetadata>);

    #[async_trait]
    impl MetadataStore for FixedMetadataStore {
        async fn lookup(&self, book_id: BookId) -> Result<Option<BookMetadata>> {
            Ok(self.0.get(&book_id).cloned())
        }
    }

    fn transport_with(docs: &[(BookId, &[(&str, &[u32])])]) -> LocalIndexTransport {
        let index = Arc::new(InvertedIndex::new());
        for (book_id, terms) in docs {
            let positions: BTreeMap<String, Vec<u32>> =
                terms.iter().map(|(t, p)| (t.to_string(), p.to_vec())).collect();
            index.index_document(*book_id, &positions);
        }
        LocalIndexTransport::new(index, PartitionTable::new(Vec::new(), 0))
    }

    #[tokio::test]
    async fn empty_query_returns_no_hits() {
        let transport = transport_with(&[]);
        let metadata = FixedMetadataStore(Map::new());
        let hits = search(&transport, &metadata, "   ", QueryMode::Or, 10, &MetadataFilters::default())
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn and_mode_requires_every_term() {
        let transport = transport_with(&[
            (1, &[("whale", &[0]), ("sea", &[1])]),
            (2, &[("whale", &[0])]),
        ]);
        let metadata = FixedMetadataStore(Map::new());
        let hits = search(&transport, &metadata, "whale sea", QueryMode::And, 10, &MetadataFilters::default())
            .await
            .unwrap();
        assert_eq!(hits.iter().map(|h| h.book_id).collect::<Vec<_>>(), vec![1]);
    }

    #[tokio::test]
    async fn or_mode_unions_candidates_and_ranks_by_score() {
        let transport = transport_with(&[
            (1, &[("whale", &[0, 4, 9])]),
            (2, &[("whale", &[0])]),
            (3, &[("sea", &[0])]),
        ]);
        let metadata = FixedMetadataStore(Map::new());
        let hits = search(&transport, &metadata, "whale", QueryMode::Or, 10, &MetadataFilters::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].book_id, 1);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn ties_break_by_ascending_book_id() {
        let transport = transport_with(&[(2, &[("whale", &[0])]), (1, &[("whale", &[0])])]);
        let metadata = FixedMetadataStore(Map::new());
        let hits = search(&transport, &metadata, "whale", QueryMode::Or, 10, &MetadataFilters::default())
            .await
            .unwrap();
        assert_eq!(hits.iter().map(|h| h.book_id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[tokio::test]
    async fn limit_truncates_results() {
        let transport = transport_with(&[(1, &[("whale", &[0])]), (2, &[("whale", &[0])]), (3, &[("whale", &[0])])]);
        let metadata = FixedMetadataStore(Map::new());
        let hits = search(&transport, &metadata, "whale", QueryMode::Or, 2, &MetadataFilters::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn author_filter_drops_non_matching_hits() {
        let transport = transport_with(&[(1, &[("whale", &[0])]), (2, &[("whale", &[0])])]);
        let mut meta = Map::new();
        meta.insert(1, BookMetadata { book_id: 1, title: Some("Moby Dick".into()), author: Some("Herman Melville".into()), language: Some("en".into()), year: Some(1851) });
        meta.insert(2, BookMetadata { book_id: 2, title: Some("Other".into()), author: Some("Someone Else".into()), language: Some("en".into()), year: Some(1900) });
        let metadata = FixedMetadataStore(meta);
        let filters = MetadataFilters { author: Some("melville".into()), ..Default::default() };
        let hits = search(&transport, &metadata, "whale", QueryMode::Or, 10, &filters).await.unwrap();
        assert_eq!(hits.iter().map(|h| h.book_id).collect::<Vec<_>>(), vec![1]);
    }
}
