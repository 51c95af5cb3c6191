use std::env;

/// AppConfig
///
/// Holds the application's entire configuration state. This struct is designed
/// to be immutable once loaded, ensuring consistency across all threads and
/// services (Repository, MediaStorage, token minting). It is pulled into the
/// application state via FromRef.
#[derive(Clone)]
pub struct AppConfig {
    // Runtime environment marker. Controls subscriber format and schema setup.
    pub env: Env,
    // Postgres connection string. Absent means the in-memory repository.
    pub database_url: Option<String>,
    // Directory that backs the filesystem media store.
    pub media_root: String,
    // Secret used to sign and validate session tokens.
    pub jwt_secret: String,
    // Listen address for the HTTP server.
    pub bind_addr: String,
}

/// Env
///
/// Defines the runtime context, used to switch between development
/// conveniences (in-memory repository fallback, pretty logs, automatic schema
/// setup) and hardened production behavior.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// default
    ///
    /// Provides a safe, non-panicking AppConfig instance primarily used for
    /// test setup. This allows tests to build application state without
    /// touching environment variables.
    fn default() -> Self {
        Self {
            env: Env::Local,
            database_url: None,
            media_root: "./media".to_string(),
            jwt_secret: "local-test-secret-do-not-deploy".to_string(),
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// The canonical function for initializing the application configuration
    /// at startup. It reads all parameters from environment variables and
    /// implements the **fail-fast** principle.
    ///
    /// # Panics
    /// Panics if a critical environment variable required for the current
    /// runtime environment (especially Production) is not found. This prevents
    /// the application from starting with an incomplete or insecure
    /// configuration.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        // Secret Resolution
        // The production secret is mandatory and must be explicitly set.
        let jwt_secret = match env {
            Env::Production => env::var("CMS_JWT_SECRET")
                .expect("FATAL: CMS_JWT_SECRET must be set in production."),
            _ => env::var("CMS_JWT_SECRET")
                .unwrap_or_else(|_| "local-test-secret-do-not-deploy".to_string()),
        };

        let media_root = env::var("CMS_MEDIA_ROOT").unwrap_or_else(|_| "./media".to_string());
        let bind_addr = env::var("CMS_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        match env {
            Env::Local => Self {
                env: Env::Local,
                // Local development works without a database at all; the
                // in-memory repository takes over when DATABASE_URL is unset.
                database_url: env::var("DATABASE_URL").ok(),
                media_root,
                jwt_secret,
                bind_addr,
            },
            Env::Production => Self {
                env: Env::Production,
                database_url: Some(
                    env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod"),
                ),
                media_root,
                jwt_secret,
                bind_addr,
            },
        }
    }
}
