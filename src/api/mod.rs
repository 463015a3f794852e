//! HTTP API server module
//!
//! Exposes the submission gateway and read access to stored results over
//! HTTP. The router is built from explicitly injected components, so tests
//! can drive it with in-memory storage.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod routes;
pub mod state;

pub use state::ApiState;

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Create the API router with all route definitions
///
/// # Routes
///
/// - `POST /api/scrape` - Submit a batch of URLs
/// - `GET /api/media` - List stored media (filter by type and alt text, paginated)
/// - `GET /api/stats` - Queue depth and result totals
/// - `GET /health` - Health check
pub fn create_router(state: ApiState) -> Router {
    // The submitting UI is served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/scrape", post(routes::submit_urls))
        .route("/api/media", get(routes::list_media))
        .route("/api/stats", get(routes::stats))
        .route("/health", get(routes::health_check))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Binds the listener for the API server
pub async fn bind(address: SocketAddr) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(address).await?;

    tracing::info!(address = %listener.local_addr()?, "API server listening");
    Ok(listener)
}

/// Serves the router until `shutdown` is cancelled
///
/// In-flight requests are allowed to complete before this returns.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}
