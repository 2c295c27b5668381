use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{StatusCode, header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{AppConfig, Env};

/// Role
///
/// Roles issued by the identity provider. Moderators and admins share every
/// moderation permission in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Moderator,
    Admin,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Role> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Role::User),
            "moderator" => Some(Role::Moderator),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Claims
///
/// Payload expected inside the bearer JWT issued by the identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's id.
    pub sub: Uuid,
    /// Expiration Time (exp): the token is refused after this timestamp.
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
    /// Role names. Unknown names are ignored.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// AuthUser
///
/// The resolved identity of a caller, as returned by the Identity Provider
/// Gateway. Handlers receive it through the extractor below.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub roles: Vec<Role>,
}

impl AuthUser {
    pub fn new(id: Uuid, roles: Vec<Role>) -> Self {
        Self { id, roles }
    }

    /// True for moderators and admins.
    pub fn is_moderator(&self) -> bool {
        self.roles
            .iter()
            .any(|role| matches!(role, Role::Moderator | Role::Admin))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid credential: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("credential refused: {0}")]
    Refused(String),
    #[error("user {0} not found")]
    UserNotFound(Uuid),
    #[error("identity provider unavailable: {0}")]
    Unavailable(#[from] reqwest::Error),
}

/// IdentityGateway
///
/// Contract of the external identity provider: credential resolution and
/// display name lookups.
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    async fn resolve_caller(&self, credential: &str) -> Result<AuthUser, IdentityError>;
    async fn display_name(&self, user_id: Uuid) -> Result<String, IdentityError>;
}

pub type IdentityState = Arc<dyn IdentityGateway>;

/// Fallback display name for accounts without a nickname.
pub const ANONYMOUS_NAME: &str = "anonymous";

#[derive(Debug, Deserialize)]
struct IdentityProfile {
    nickname: Option<String>,
}

/// JwtIdentityGateway
///
/// Verifies HS256 bearer tokens locally and resolves display names through
/// the identity provider's admin API.
pub struct JwtIdentityGateway {
    decoding_key: DecodingKey,
    client: reqwest::Client,
    base_url: String,
    admin_secret: String,
}

impl JwtIdentityGateway {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            client: reqwest::Client::new(),
            base_url: config.identity_url.trim_end_matches('/').to_string(),
            admin_secret: config.identity_admin_secret.clone(),
        }
    }
}

#[async_trait]
impl IdentityGateway for JwtIdentityGateway {
    async fn resolve_caller(&self, credential: &str) -> Result<AuthUser, IdentityError> {
        let mut validation = Validation::default();
        // Ensure expiration time validation is always active.
        validation.validate_exp = true;

        let claims = decode::<Claims>(credential, &self.decoding_key, &validation)?.claims;

        let roles = claims
            .roles
            .iter()
            .filter_map(|raw| {
                let role = Role::parse(raw);
                if role.is_none() {
                    tracing::warn!(user_id = %claims.sub, role = %raw, "Ignoring unknown role");
                }
                role
            })
            .collect();

        Ok(AuthUser::new(claims.sub, roles))
    }

    async fn display_name(&self, user_id: Uuid) -> Result<String, IdentityError> {
        let response = self
            .client
            .get(format!("{}/users/{}", self.base_url, user_id))
            .header("x-identity-admin-secret", &self.admin_secret)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(IdentityError::UserNotFound(user_id));
        }

        let profile: IdentityProfile = response.error_for_status()?.json().await?;
        Ok(profile
            .nickname
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| ANONYMOUS_NAME.to_string()))
    }
}

/// Local development bypass: `x-user-id` plus optional comma-separated `x-user-roles`.
fn local_bypass(parts: &Parts) -> Option<AuthUser> {
    let id = parts
        .headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok())?;

    let mut roles: Vec<Role> = parts
        .headers
        .get("x-user-roles")
        .and_then(|value| value.to_str().ok())
        .map(|raw| raw.split(',').filter_map(Role::parse).collect())
        .unwrap_or_default();
    if roles.is_empty() {
        roles.push(Role::User);
    }

    Some(AuthUser::new(id, roles))
}

/// Resolves the caller of a request.
///
/// `Ok(None)` means the request carries no credential at all; a credential that
/// is present but unusable is always a rejection.
async fn resolve_parts<S>(parts: &mut Parts, state: &S) -> Result<Option<AuthUser>, StatusCode>
where
    S: Send + Sync,
    IdentityState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    let identity = IdentityState::from_ref(state);
    let config = AppConfig::from_ref(state);

    // Guarded by the Env check; production always falls through to the token flow.
    if config.env == Env::Local {
        if let Some(user) = local_bypass(parts) {
            return Ok(Some(user));
        }
    }

    let Some(auth_header) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let token = auth_header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    match identity.resolve_caller(token).await {
        Ok(user) => Ok(Some(user)),
        Err(e) => {
            tracing::debug!("Rejected credential: {}", e);
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// AuthUser Extractor Implementation
///
/// Makes `AuthUser` usable as a handler argument on authenticated routes.
///
/// Rejection: `StatusCode::UNAUTHORIZED` (401) on a missing or invalid credential.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    IdentityState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        resolve_parts(parts, state)
            .await?
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

/// Optional extraction (`Option<AuthUser>`) for public reads: anonymous callers
/// resolve to `None`, a bad credential is still refused.
impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    IdentityState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        resolve_parts(parts, state).await
    }
}
