//! Route definitions for the Quill HTTP API.
//!
//! Upload routes live under `/file`, merged files are served from
//! `/uploads`, and `/health` reports liveness.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::map_response,
    routing::{get, post},
};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;

use crate::handlers;
use crate::middleware::timeout::envelope_timeout;
use crate::state::AppState;

/// Allowance on top of the chunk size for multipart boundaries and text fields.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the router with all routes.
///
/// Verify and chunk requests share the regular request timeout; merge,
/// which streams the whole file, gets its own longer timeout. Timeouts are
/// answered with the usual envelope.
pub fn build_router(state: AppState) -> Router {
    let server = &state.config.server;
    let chunk_limit = (state.config.upload.max_chunk_size_bytes as usize)
        .saturating_add(MULTIPART_OVERHEAD);

    let file_routes = Router::new()
        .route("/verify", post(handlers::upload::verify))
        .route(
            "/chunk",
            post(handlers::upload::upload_chunk).layer(DefaultBodyLimit::max(chunk_limit)),
        )
        .layer(TimeoutLayer::new(server.request_timeout()))
        .route(
            "/merge",
            post(handlers::upload::merge).layer(TimeoutLayer::new(server.merge_timeout())),
        )
        .layer(map_response(envelope_timeout));

    Router::new()
        .nest("/file", file_routes)
        .route("/health", get(handlers::health::health))
        .nest_service("/uploads", ServeDir::new(&state.config.upload.root))
        .with_state(state)
}
