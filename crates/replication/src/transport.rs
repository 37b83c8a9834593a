//! Replication transport (C4, spec §4.4) — sends a book's bytes + hash to
//! the peers selected by [`crate::ring::select_peers`].

use crate::ring::select_peers;
use alexandria_core::types::{BookId, ReplicationRequest, ReplicationResponse};
use std::time::Duration;
use tracing::warn;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const TOTAL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ReplicationClient {
    http: reqwest::Client,
}

impl ReplicationClient {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(TOTAL_TIMEOUT)
            .build()
            .expect("reqwest client with static config always builds");
        Self { http }
    }

    /// Replicates `request` to `min(P, R−1)` peers chosen from `peers` by
    /// [`select_peers`]. Peer failures are logged and counted, never
    /// retried here — the `doc.ingested` event lets the indexer (and any
    /// admin tool) read from surviving replicas instead.
    pub async fn replicate(
        &self,
        peers: &[String],
        replication_factor: usize,
        request: &ReplicationRequest,
    ) -> Vec<ReplicationResponse> {
        let targets = select_peers(peers, request.book_id, replication_factor);
        if targets.is_empty() {
            return Vec::new();
        }

        let sends = targets.into_iter().map(|peer| self.send_one(peer, request));
        futures::future::join_all(sends).await
    }

    async fn send_one(&self, peer_base_url: String, request: &ReplicationRequest) -> ReplicationResponse {
        let url = format!("{}/replication", peer_base_url.trim_end_matches('/'));
        match self.http.post(&url).json(request).send().await {
            Ok(resp) => match resp.json::<ReplicationResponse>().await {
                Ok(body) => body,
                Err(e) => failure_response(request.book_id, &peer_base_url, e.to_string()),
            },
            Err(e) => {
                warn!(peer = %peer_base_url, book_id = request.book_id, error = %e, "replication send failed");
                failure_response(request.book_id, &peer_base_url, e.to_string())
            }
        }
    }
}

impl Default for ReplicationClient {
    fn default() -> Self {
        Self::new()
    }
}

fn failure_response(book_id: BookId, peer: &str, message: String) -> ReplicationResponse {
    ReplicationResponse { success: false, node_id: peer.to_string(), book_id, message }
}

/// Count of successful replies — the caller reports this as `replicasWritten`.
pub fn count_successes(responses: &[ReplicationResponse]) -> usize {
    responses.iter().filter(|r| r.success).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replicate_with_no_peers_skips_without_error() {
        let client = ReplicationClient::new();
        let request = ReplicationRequest {
            book_id: 1,
            source_node_id: "node-a".to_string(),
            relative_path: "20240101/00/1".to_string(),
            raw_content: vec![1, 2, 3],
            header_content: vec![],
            body_content: vec![1, 2, 3],
            content_hash: "deadbeef".to_string(),
        };
        let responses = client.replicate(&[], 3, &request).await;
        assert!(responses.is_empty());
    }

    #[test]
    fn count_successes_counts_only_successful_responses() {
        let responses = vec![
            ReplicationResponse { success: true, node_id: "a".into(), book_id: 1, message: "ok".into() },
            ReplicationResponse { success: false, node_id: "b".into(), book_id: 1, message: "err".into() },
        ];
        assert_eq!(count_successes(&responses), 1);
    }
}
