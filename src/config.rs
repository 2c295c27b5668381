use std::env;

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once loaded and
/// pulled into handlers and extractors via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls the development bypass and log format.
    pub env: Env,
    // Postgres connection string. `None` (local only) selects the in-memory store.
    pub db_url: Option<String>,
    // HS256 secret shared with the identity provider for bearer token validation.
    pub jwt_secret: String,
    // Base URL of the identity provider's admin API (display name lookups).
    pub identity_url: String,
    // Secret sent with every admin API call.
    pub identity_admin_secret: String,
    // Socket address the HTTP listener binds to.
    pub bind_addr: String,
}

/// Env
///
/// Runtime context: local development utilities (memory store, header bypass)
/// versus hardened production infrastructure.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";
const LOCAL_IDENTITY_URL: &str = "http://localhost:8081";
const LOCAL_IDENTITY_ADMIN_SECRET: &str = "local-admin-secret";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

impl Default for AppConfig {
    /// default
    ///
    /// Safe, non-panicking configuration for test state scaffolding.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            identity_url: LOCAL_IDENTITY_URL.to_string(),
            identity_admin_secret: LOCAL_IDENTITY_ADMIN_SECRET.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from the environment at startup, following the
    /// **fail-fast** principle.
    ///
    /// # Panics
    /// Panics in production when `DATABASE_URL`, `JWT_SECRET`, `IDENTITY_URL` or
    /// `IDENTITY_ADMIN_SECRET` is missing.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        match env {
            Env::Local => Self {
                env: Env::Local,
                // Absent means "run on the in-memory store".
                db_url: env::var("DATABASE_URL").ok(),
                jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
                identity_url: env::var("IDENTITY_URL")
                    .unwrap_or_else(|_| LOCAL_IDENTITY_URL.to_string()),
                identity_admin_secret: env::var("IDENTITY_ADMIN_SECRET")
                    .unwrap_or_else(|_| LOCAL_IDENTITY_ADMIN_SECRET.to_string()),
                bind_addr,
            },
            Env::Production => Self {
                env: Env::Production,
                db_url: Some(
                    env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod"),
                ),
                jwt_secret: env::var("JWT_SECRET")
                    .expect("FATAL: JWT_SECRET must be set in production."),
                identity_url: env::var("IDENTITY_URL")
                    .expect("FATAL: IDENTITY_URL required in prod"),
                identity_admin_secret: env::var("IDENTITY_ADMIN_SECRET")
                    .expect("FATAL: IDENTITY_ADMIN_SECRET required in prod"),
                bind_addr,
            },
        }
    }
}
