use std::env;

/// Fallback signing secret for local development only.
pub const LOCAL_JWT_SECRET: &str = "local-development-rentals-secret";

/// AppConfig
///
/// The service's whole configuration, loaded once at startup and then only read.
/// It is handed to constructors explicitly (store handle, signing secret) and pulled
/// into handlers via `FromRef`; nothing reads the environment after `load()`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Postgres connection string. `None` selects the in-memory store (local only).
    pub db_url: Option<String>,
    // Runtime environment marker. Controls log format and which settings are mandatory.
    pub env: Env,
    // HMAC secret used to sign and verify identity tokens.
    pub jwt_secret: String,
    // Socket address the HTTP server binds to.
    pub listen_addr: String,
}

/// Env
///
/// Runtime context: `Local` tolerates missing settings, `Production` does not.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Safe, non-panicking configuration for tests: local mode, in-memory store.
    fn default() -> Self {
        Self {
            db_url: None,
            env: Env::Local,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            listen_addr: "127.0.0.1:3000".to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables (`APP_ENV`, `DATABASE_URL`,
    /// `RENTALS_JWT_SECRET`, `LISTEN_ADDR`).
    ///
    /// # Panics
    /// In `production`, panics when `DATABASE_URL` or `RENTALS_JWT_SECRET` is missing, so
    /// the service never starts with an ephemeral store or a guessable secret.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let listen_addr = env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        match env {
            Env::Local => Self {
                env: Env::Local,
                // Without a database URL the service falls back to the in-memory store.
                db_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
                jwt_secret: env::var("RENTALS_JWT_SECRET")
                    .unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
                listen_addr,
            },
            Env::Production => Self {
                env: Env::Production,
                db_url: Some(
                    env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in production"),
                ),
                jwt_secret: env::var("RENTALS_JWT_SECRET")
                    .expect("FATAL: RENTALS_JWT_SECRET must be set in production."),
                listen_addr,
            },
        }
    }
}
