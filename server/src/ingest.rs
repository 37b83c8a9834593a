//! Ingest orchestration: composes C2 (local write) with C4 (replicate) and
//! C5 (publish `index.request`), per spec §4.2's description of what
//! `ingest` invokes. This composition lives here, in the binary, rather
//! than inside `alexandria-datalake`, so that crate stays free of a
//! dependency on replication and bus transports it has no other reason to
//! know about.

use crate::state::AppState;
use alexandria_core::hash;
use alexandria_core::types::{DocIngestedMessage, IndexRequestMessage, IngestStatus, ReplicationRequest};
use alexandria_core::error::Result;
use chrono::Utc;
use tracing::info;

pub struct IngestReport {
    pub status: IngestStatus,
    pub path: String,
    pub replicas_written: usize,
}

pub async fn orchestrate_ingest(state: &AppState, book_id: u64, raw: &[u8]) -> Result<IngestReport> {
    let outcome = state.datalake.ingest(book_id, raw)?;

    if outcome.status != IngestStatus::Downloaded {
        return Ok(IngestReport { status: outcome.status, path: outcome.relative_path, replicas_written: 0 });
    }

    let split = alexandria_datalake::split(raw);
    let content_hash = hash::hash(raw);

    let replication_request = ReplicationRequest {
        book_id,
        source_node_id: state.config.node_id.clone(),
        relative_path: outcome.relative_path.clone(),
        raw_content: raw.to_vec(),
        header_content: split.header,
        body_content: split.body,
        content_hash: content_hash.clone(),
    };
    let responses = state
        .replication
        .replicate(&state.config.datalake_peers, state.config.replication_factor, &replication_request)
        .await;
    let replicas_written = alexandria_replication::count_successes(&responses);

    let message = IndexRequestMessage {
        book_id,
        node_id: state.config.node_id.clone(),
        datalake_path: outcome.relative_path.clone(),
        content_hash: content_hash.clone(),
        timestamp: Utc::now().timestamp_millis(),
    };
    state.bus.publish(&state.config.indexing_queue_name, &message).await?;
    state
        .bus
        .publish_ingested(
            alexandria_bus::DOC_INGESTED_QUEUE,
            &DocIngestedMessage {
                book_id,
                node_id: state.config.node_id.clone(),
                content_hash,
                timestamp: message.timestamp,
            },
        )
        .await?;

    info!(book_id, replicas_written, "ingest complete");
    Ok(IngestReport { status: outcome.status, path: outcome.relative_path, replicas_written })
}
