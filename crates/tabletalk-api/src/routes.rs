//! Router setup and server startup.
//!
//! Configures the axum Router with CORS, tracing, a body limit sized for
//! uploads, and the two endpoint handlers.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use tabletalk_core::error::TabletalkError;

use crate::handlers;
use crate::state::AppState;

/// Upload ceiling; the whole file is buffered in memory during ingestion.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Any origin may call the service; auth is out of scope here.
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/health", get(handlers::health))
        .route("/upload_and_query", post(handlers::upload_and_query))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured port.
///
/// Binds to 127.0.0.1 (localhost only).
pub async fn start_server(state: AppState) -> Result<(), TabletalkError> {
    let addr = format!("127.0.0.1:{}", state.config.general.port);
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| TabletalkError::Api(format!("Failed to bind: {}", e)))?;

    axum::serve(listener, router)
        .await
        .map_err(|e| TabletalkError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
