//! Hash-ring replica placement (spec §4.4, testable property 4, scenario S3).

use alexandria_core::types::BookId;

/// Peers selected to hold a replica of `book_id`, given a peer ring of
/// size `P = peers.len()` and replication factor `R`.
///
/// Sends to ring indices `(bookId mod P + i) mod P` for
/// `i ∈ [0, min(P, R−1))` — a contiguous slice starting at `bookId mod P`,
/// distributing load evenly in expectation rather than always targeting
/// the first peers.
pub fn select_peers(peers: &[String], book_id: BookId, replication_factor: usize) -> Vec<String> {
    let ring_size = peers.len();
    if ring_size == 0 || replication_factor <= 1 {
        return Vec::new();
    }

    let count = ring_size.min(replication_factor - 1);
    let start = (book_id as usize) % ring_size;
    (0..count).map(|i| peers[(start + i) % ring_size].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn scenario_s3_replica_placement() {
        let ring = peers(&["A", "B", "C", "D"]);
        let selected = select_peers(&ring, 5, 3);
        assert_eq!(selected, vec!["B".to_string(), "C".to_string()]);
    }

    #[test]
    fn replication_factor_one_sends_to_zero_peers() {
        let ring = peers(&["A", "B", "C"]);
        assert!(select_peers(&ring, 1, 1).is_empty());
    }

    #[test]
    fn empty_peer_ring_is_skipped_without_error() {
        let selected = select_peers(&[], 42, 3);
        assert!(selected.is_empty());
    }

    #[test]
    fn selection_size_is_min_of_ring_and_factor_minus_one() {
        let ring = peers(&["A", "B"]);
        // R=5 but only 2 peers exist — can select at most `ring_size` peers.
        let selected = select_peers(&ring, 0, 5);
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn selection_wraps_around_the_ring() {
        let ring = peers(&["A", "B", "C"]);
        // book_id 2 -> start index 2, need 2 peers -> indices 2, 0 (wrap).
        let selected = select_peers(&ring, 2, 3);
        assert_eq!(selected, vec!["C".to_string(), "A".to_string()]);
    }
}
