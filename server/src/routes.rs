//! HTTP surface: the node-to-node replication endpoint (spec §6a) plus an
//! operational `/health` and `/ingest` entrypoint for driving C2+C4+C5.

use crate::ingest::orchestrate_ingest;
use crate::state::AppState;
use alexandria_core::types::{ReplicationRequest, ReplicationResponse};
use alexandria_search::{search, MetadataFilters, MetadataStore, QueryMode};
use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/replication", post(replication))
        .route("/ingest", post(ingest))
        .route("/search", get(search_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The external metadata store (title/author/language/year decoration) is
/// out of scope for this data plane; the node serves raw `bookId` + score
/// hits and lets a downstream caller decorate them.
struct NoMetadataStore;

#[async_trait]
impl MetadataStore for NoMetadataStore {
    async fn lookup(&self, _book_id: u64) -> alexandria_core::error::Result<Option<alexandria_core::types::BookMetadata>> {
        Ok(None)
    }
}

#[derive(Deserialize)]
struct SearchParams {
    q: String,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    10
}

async fn search_handler(State(state): State<Arc<AppState>>, Query(params): Query<SearchParams>) -> impl IntoResponse {
    let mode = match params.mode.as_deref() {
        Some("and") | Some("AND") => QueryMode::And,
        _ => QueryMode::Or,
    };
    match search(&*state.index, &NoMetadataStore, &params.q, mode, params.limit, &MetadataFilters::default()).await {
        Ok(hits) => Json(serde_json::json!({
            "hits": hits.iter().map(|h| serde_json::json!({ "bookId": h.book_id, "score": h.score })).collect::<Vec<_>>()
        }))
        .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "nodeId": state.config.node_id }))
}

/// Receives a peer's replicated copy of a document (spec §6a).
async fn replication(State(state): State<Arc<AppState>>, Json(request): Json<ReplicationRequest>) -> impl IntoResponse {
    let result = state.datalake.receive_replica(
        request.book_id,
        &request.relative_path,
        &request.raw_content,
        &request.header_content,
        &request.body_content,
        &request.content_hash,
    );

    match result {
        Ok(()) => Json(ReplicationResponse {
            success: true,
            node_id: state.config.node_id.clone(),
            book_id: request.book_id,
            message: "stored".to_string(),
        })
        .into_response(),
        Err(e) => {
            warn!(book_id = request.book_id, error = %e, "replication receive failed");
            (
                StatusCode::BAD_REQUEST,
                Json(ReplicationResponse {
                    success: false,
                    node_id: state.config.node_id.clone(),
                    book_id: request.book_id,
                    message: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

#[derive(Deserialize)]
struct IngestBody {
    book_id: u64,
    #[serde(with = "alexandria_core::types::base64_bytes")]
    raw: Vec<u8>,
}

#[derive(Serialize)]
struct IngestResponse {
    status: alexandria_core::types::IngestStatus,
    path: String,
    replicas_written: usize,
}

async fn ingest(State(state): State<Arc<AppState>>, Json(body): Json<IngestBody>) -> impl IntoResponse {
    match orchestrate_ingest(&state, body.book_id, &body.raw).await {
        Ok(report) => Json(IngestResponse { status: report.status, path: report.path, replicas_written: report.replicas_written }).into_response(),
        Err(e) => {
            warn!(book_id = body.book_id, error = %e, "ingest failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
