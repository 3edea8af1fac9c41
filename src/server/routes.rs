//! HTTP route handlers for the retrieval API.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use crate::rag::core::errors::RagError;
use crate::rag::embedding::embedder::Embedder;
use crate::rag::engine::pipeline::{OutputMode, RankedSegment};
use crate::rag::notes::extraction::NotesExtraction;

use super::state::AppState;

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/query", post(query))
        .route("/process_notes", post(process_notes))
        .route("/extraction_categories", get(extraction_categories))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "halldyll-rag",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Query request.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    /// Natural-language query.
    pub query: String,
    /// Number of results; the configured default when absent.
    pub top_k: Option<usize>,
    /// Whether to summarize the results.
    #[serde(default)]
    pub summarize: bool,
}

/// Query response.
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    /// Query as received.
    pub query: String,
    /// Summary, in summarize mode when generation succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// True when vector search did not contribute.
    pub degraded: bool,
    /// Summarization error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Ranked results.
    pub results: Vec<RankedSegment>,
}

/// Notes request.
#[derive(Debug, Deserialize)]
pub struct NotesRequest {
    /// Free-text notes.
    pub text: String,
}

/// Map a pipeline error to an HTTP status.
///
/// Recoverable kinds are normally absorbed by the pipeline; one that still
/// surfaces means a backend is down, which is reported as unavailable.
fn status_for(err: &RagError) -> StatusCode {
    match err {
        RagError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
        RagError::IndexNotReady => StatusCode::SERVICE_UNAVAILABLE,
        err if err.is_recoverable() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Handle query requests.
async fn query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, (StatusCode, String)> {
    let top_k = request
        .top_k
        .unwrap_or(state.pipeline.config().retrieval.top_k);
    let mode = if request.summarize {
        OutputMode::Summarized
    } else {
        OutputMode::Ranked
    };

    let embedding = match &state.embedder {
        Some(embedder) if !request.query.trim().is_empty() => {
            embed_with_timeout(embedder.as_ref(), &request.query, embedding_timeout(&state)).await
        }
        _ => None,
    };

    let response = state
        .pipeline
        .run(&request.query, embedding, top_k, mode)
        .await
        .map_err(|e| (status_for(&e), format!("Query error: {e}")))?;

    Ok(Json(QueryResponse {
        query: response.query_text,
        summary: response.summary,
        degraded: response.degraded,
        error: response.summary_error,
        results: response.results,
    }))
}

/// Query embeddings share the vector search budget.
fn embedding_timeout(state: &AppState) -> Duration {
    Duration::from_millis(state.pipeline.config().vector_store.timeout_ms)
}

/// Embed the query; a failure or timeout leaves the vector signal out.
async fn embed_with_timeout(embedder: &dyn Embedder, text: &str, limit: Duration) -> Option<Vec<f32>> {
    match tokio::time::timeout(limit, embedder.embed_query(text)).await {
        Ok(Ok(embedding)) => Some(embedding),
        Ok(Err(err)) => {
            warn!("Query embedding failed, vector search skipped: {err}");
            None
        }
        Err(_) => {
            warn!(
                "Query embedding timed out after {} ms, vector search skipped",
                limit.as_millis()
            );
            None
        }
    }
}

/// Handle note extraction requests.
async fn process_notes(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NotesRequest>,
) -> Result<Json<NotesExtraction>, (StatusCode, Json<Value>)> {
    state.notes.extract(&request.text).await.map(Json).map_err(|err| {
        let status = match &err {
            RagError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        };
        (status, Json(json!({ "error": err.to_string() })))
    })
}

/// List configured extraction categories.
async fn extraction_categories(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "categories": state.notes.schema().categories() }))
}
