//! Shared tokenizer used by both the indexing engine (C7) and the search
//! engine (C8).
//!
//! `spec.md` §4.8 notes the indexer's word regex (`[a-záéíóúüñ]+`, allowing
//! Spanish diacritics) is richer than the query tokenizer's plain `\W+`
//! split, and calls the resulting asymmetry an acknowledged wart —
//! "implementers should unify to the richer rule." This crate does that:
//! indexing and querying both go through [`tokenize`], so diacritic terms
//! in the index stay reachable from a query.

use regex::Regex;
use std::sync::LazyLock;

/// Minimum token length after the stop-word/length filter (spec §3).
const MIN_TERM_LEN: usize = 2;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-záéíóúüñ]+").expect("static regex"));

/// Small built-in English stop list. Real deployments would load this from
/// config; the set below is enough to satisfy the spec's "stop-words
/// removed" requirement without pulling in a dictionary.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "that", "the", "to", "was", "were", "will", "with", "this", "but", "not",
    "or", "so", "if", "than",
];

/// Lowercase, extract maximal `[a-záéíóúüñ]+` runs, drop stop-words and
/// terms shorter than [`MIN_TERM_LEN`], and emit `(term, position)` pairs
/// where `position` is the 0-based count of *emitted* tokens (spec §4.7
/// step 3: "position = 0-based count of emitted tokens").
pub fn tokenize(text: &str) -> Vec<(String, u32)> {
    let lower = text.to_lowercase();
    let mut out = Vec::new();
    let mut position: u32 = 0;
    for m in WORD_RE.find_iter(&lower) {
        let term = m.as_str();
        if term.len() < MIN_TERM_LEN || STOP_WORDS.contains(&term) {
            continue;
        }
        out.push((term.to_string(), position));
        position += 1;
    }
    out
}

/// Group tokenized `(term, position)` pairs into `term -> sorted positions`
/// (spec §4.7 step 4).
pub fn term_positions(text: &str) -> std::collections::BTreeMap<String, Vec<u32>> {
    let mut map: std::collections::BTreeMap<String, Vec<u32>> = std::collections::BTreeMap::new();
    for (term, pos) in tokenize(text) {
        map.entry(term).or_default().push(pos);
    }
    for positions in map.values_mut() {
        positions.sort_unstable();
    }
    map
}
