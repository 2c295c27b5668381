use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a credential. Listings here run in the public
/// scope: a filter without an explicit `approved` flag only sees approved
/// content. A caller who does send a valid credential still gets the detailed
/// projection for their own entries.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for monitoring and load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET /statistics
        // Totals and current-quarter counts for each entity kind.
        .route("/statistics", get(handlers::get_statistics))
        // --- Authors ---
        .route("/authors/page", post(handlers::list_authors))
        .route("/authors/page_count", post(handlers::count_author_pages))
        .route("/authors/{id}", get(handlers::get_author))
        // --- Sources ---
        .route("/sources/page", post(handlers::list_sources))
        .route("/sources/page_count", post(handlers::count_source_pages))
        .route("/sources/{id}", get(handlers::get_source))
        // --- Definitions ---
        // GET /definitions/newest?limit=...
        // Landing page feed of the latest approved definitions.
        .route("/definitions/newest", get(handlers::newest_definitions))
        .route("/definitions/page", post(handlers::list_definitions))
        .route("/definitions/page_count", post(handlers::count_definition_pages))
        .route("/definitions/{id}", get(handlers::get_definition))
}
