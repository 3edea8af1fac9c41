//! HTTP front end for the query pipeline.
//!
//! `/query` answers ranked or summarized queries, `/process_notes` and
//! `/extraction_categories` expose structured note extraction.

pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::rag::core::errors::RagResult;

/// Port used when the configuration does not set one.
pub const DEFAULT_PORT: u16 = 3000;

/// Router with permissive CORS and per-request tracing.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Bind the listener on all interfaces.
///
/// # Errors
/// Returns `Io` if the port cannot be bound.
pub async fn bind(port: u16) -> RagResult<TcpListener> {
    let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
    Ok(listener)
}

/// Serve queries on `listener` until `shutdown` completes.
///
/// # Errors
/// Returns `Io` if accepting connections fails.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> RagResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("RAG server accepting queries on http://{addr}");
    }
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("RAG server stopped");
    Ok(())
}
