use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Catalog core: store, query language, moderation rules and projections.
pub mod error;
pub mod filters;
pub mod lifecycle;
pub mod memory;
pub mod models;
pub mod projection;
pub mod query;
pub mod repository;
pub mod requests;
pub mod service;
pub mod visibility;

// HTTP shell and infrastructure.
pub mod auth;
pub mod config;
pub mod handlers;

// Module for routing segregation (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use auth::{IdentityState, JwtIdentityGateway};
pub use config::AppConfig;
pub use error::{CatalogError, CatalogResult};
pub use memory::MemoryRepository;
pub use repository::{PostgresRepository, RepositoryState};
pub use service::CatalogService;

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` type into the
/// OpenAPI document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_author, handlers::get_source, handlers::get_definition,
        handlers::list_authors, handlers::count_author_pages,
        handlers::list_sources, handlers::count_source_pages,
        handlers::list_definitions, handlers::count_definition_pages,
        handlers::newest_definitions, handlers::get_statistics,
        handlers::submit_author, handlers::edit_author,
        handlers::submit_source, handlers::edit_source,
        handlers::submit_definition, handlers::edit_definition,
        handlers::review_authors, handlers::review_author_pages,
        handlers::review_sources, handlers::review_source_pages,
        handlers::review_definitions, handlers::review_definition_pages,
        handlers::approve_definition, handlers::reject_definition,
        handlers::delete_author, handlers::delete_source
    ),
    components(
        schemas(
            models::AuthorType, models::SourceType, models::DefinitionCategory,
            models::ModerationStatus, models::PersonProperties, models::OrganizationProperties,
            models::BookProperties, models::JournalProperties, models::WebProperties,
            requests::CreateAuthorRequest, requests::CreateSourceRequest,
            requests::CreateDefinitionRequest, requests::ChangeAuthorRequest,
            requests::ChangeSourceRequest, requests::ChangeDefinitionRequest,
            requests::RejectDefinitionRequest, requests::AuthorFilter, requests::SourceFilter,
            requests::DefinitionFilter, requests::AuthorPageRequest, requests::SourcePageRequest,
            requests::DefinitionPageRequest, requests::AuthorPageCountRequest,
            requests::SourcePageCountRequest, requests::DefinitionPageCountRequest,
            projection::AuthorView, projection::SourceView, projection::DefinitionView,
            projection::AuthorDetail, projection::SourceDetail, projection::DefinitionDetail,
            projection::DefinitionSummary, projection::PageCountResponse, projection::Statistics,
        )
    ),
    tags(
        (name = "reference-catalog", description = "Moderated reference catalog API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, immutable container of shared services. Cloned into every
/// request; all mutable state lives in the Entity Store.
#[derive(Clone)]
pub struct AppState {
    /// Entity Store (Postgres or in-memory).
    pub repo: RepositoryState,
    /// Identity Provider Gateway: credential resolution and display names.
    pub identity: IdentityState,
    /// Configuration: the loaded, immutable environment configuration.
    pub config: AppConfig,
}

impl AppState {
    /// Per-request catalog facade over the shared handles.
    pub fn catalog(&self) -> CatalogService {
        CatalogService::new(self.repo.clone(), self.identity.clone())
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for IdentityState {
    fn from_ref(app_state: &AppState) -> IdentityState {
        app_state.identity.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Enforces authentication for the `authenticated_routes`: extracting `AuthUser`
/// rejects the request with 401 before the handler runs.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, applies global and scoped middleware and
/// registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public Routes: No middleware applied.
        .merge(public::public_routes())
        // Authenticated Routes: Protected by the `auth_middleware`.
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        // Admin Routes: Nested under '/admin'. Role checks happen in the lifecycle engine.
        .nest("/admin", admin::admin_routes())
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing, with the request id in the span.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, URI and the `x-request-id` header, so
/// every log line of one request is correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
