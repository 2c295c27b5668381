use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use uuid::Uuid;

use crate::repository::{EntityKind, StoreError};

/// CatalogError
///
/// Every outcome the catalog core reports back to its callers. Domain checks
/// (approval state, ownership, unanswered rejections, dependents) are evaluated
/// before any mutating store call and surface here verbatim; infrastructure
/// failures surface as `StoreUnavailable` and are never retried by the core.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The entity (or a referenced entity) does not exist, or the caller may not see it.
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: Uuid },

    /// An identifier could not be parsed.
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("{kind} {id} is already approved")]
    AlreadyApproved { kind: EntityKind, id: Uuid },

    /// A moderator tried to reject a definition the owner has not revised since the last rejection.
    #[error("definition {id} has a rejection that has not been answered yet")]
    UnansweredRejection { id: Uuid },

    #[error("caller does not own the requested content")]
    OwnershipViolation,

    #[error("caller lacks the moderator or admin role")]
    InsufficientRole,

    /// Deletion blocked: `blocking` lists every dependent entity id.
    #[error("{kind} {id} is still referenced by {} entries", .blocking.len())]
    InUse {
        kind: EntityKind,
        id: Uuid,
        blocking: Vec<Uuid>,
    },

    #[error("validation failed on fields: {}", .fields.join(", "))]
    ValidationFailed { fields: Vec<String> },

    #[error("caller identity is required")]
    Unauthenticated,

    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
}

/// Convenience alias used across the core.
pub type CatalogResult<T> = Result<T, CatalogError>;

impl CatalogError {
    pub fn validation<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CatalogError::ValidationFailed {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::StoreUnavailable(StoreError::Encoding(err))
    }
}

/// Translation of core outcomes for the HTTP shell.
///
/// Single-entity visibility failures are already folded into `NotFound` by the
/// visibility policy, so nothing here can reveal moderation state.
impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            CatalogError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            CatalogError::InvalidReference(_) => (StatusCode::BAD_REQUEST, "INVALID_REFERENCE"),
            CatalogError::AlreadyApproved { .. } => (StatusCode::CONFLICT, "ALREADY_APPROVED"),
            CatalogError::UnansweredRejection { .. } => {
                (StatusCode::CONFLICT, "UNANSWERED_REJECTION")
            }
            CatalogError::OwnershipViolation => (StatusCode::FORBIDDEN, "OWNERSHIP_VIOLATION"),
            CatalogError::InsufficientRole => (StatusCode::FORBIDDEN, "INSUFFICIENT_ROLE"),
            CatalogError::InUse { .. } => (StatusCode::CONFLICT, "IN_USE"),
            CatalogError::ValidationFailed { .. } => {
                (StatusCode::BAD_REQUEST, "VALIDATION_FAILED")
            }
            CatalogError::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            CatalogError::StoreUnavailable(err) => {
                tracing::error!(error = %err, "Store unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE")
            }
        };

        let body = match &self {
            CatalogError::InUse { blocking, .. } => json!({
                "error": self.to_string(),
                "code": code,
                "blocking": blocking,
            }),
            CatalogError::ValidationFailed { fields } => json!({
                "error": self.to_string(),
                "code": code,
                "fields": fields,
            }),
            CatalogError::StoreUnavailable(_) => json!({
                "error": "The catalog store is temporarily unavailable",
                "code": code,
            }),
            _ => json!({
                "error": self.to_string(),
                "code": code,
            }),
        };

        (status, Json(body)).into_response()
    }
}
