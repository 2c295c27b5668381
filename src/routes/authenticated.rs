use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{post, put},
};

/// Authenticated Router Module
///
/// Routes for any caller who passed the authentication layer: submissions,
/// owner-only edits and the review listings.
///
/// Access Control Strategy:
/// The `auth_middleware` layer above this router rejects anonymous requests.
/// Ownership and approval-state checks happen in the lifecycle engine.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Submission & Editing ---
        // POST /authors, PUT /authors/{id}
        .route("/authors", post(handlers::submit_author))
        .route("/authors/{id}", put(handlers::edit_author))
        // POST /sources, PUT /sources/{id}
        // Referenced authors must exist at write time.
        .route("/sources", post(handlers::submit_source))
        .route("/sources/{id}", put(handlers::edit_source))
        // POST /definitions, PUT /definitions/{id}
        // An effective edit answers a pending rejection.
        .route("/definitions", post(handlers::submit_definition))
        .route("/definitions/{id}", put(handlers::edit_definition))
        // --- Review Listings ---
        // Unapproved content: moderators see everything, other callers only
        // what they submitted (and must ask for it explicitly).
        .route("/review/authors/page", post(handlers::review_authors))
        .route("/review/authors/page_count", post(handlers::review_author_pages))
        .route("/review/sources/page", post(handlers::review_sources))
        .route("/review/sources/page_count", post(handlers::review_source_pages))
        .route("/review/definitions/page", post(handlers::review_definitions))
        .route(
            "/review/definitions/page_count",
            post(handlers::review_definition_pages),
        )
}
