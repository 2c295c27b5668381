use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, post},
};

/// Admin Router Module
///
/// Moderation endpoints, nested under `/admin`.
///
/// Access Control:
/// Every handler takes an `AuthUser`, so anonymous requests are refused by the
/// extractor. The moderator-or-admin role check happens in the lifecycle engine,
/// which answers 403 for regular users.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /admin/definitions/{id}/approve
        // Approves the definition after cascading to its source and authors.
        .route(
            "/definitions/{id}/approve",
            post(handlers::approve_definition),
        )
        // POST /admin/definitions/{id}/reject
        // Appends a rejection with the moderator's reason.
        .route("/definitions/{id}/reject", post(handlers::reject_definition))
        // DELETE /admin/authors/{id}, DELETE /admin/sources/{id}
        // Refused with the blocking ids while still referenced.
        .route("/authors/{id}", delete(handlers::delete_author))
        .route("/sources/{id}", delete(handlers::delete_source))
}
