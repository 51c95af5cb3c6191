use cms_portal::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{MemoryRepository, PostgresRepository, RepositoryState},
    storage::{FsMediaStorage, MediaState},
    templates::{TemplateEngine, TemplateState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// The asynchronous entry point for the application, responsible for
/// initializing all core components: Configuration, Logging, Persistence,
/// Media Storage, Templates, and the HTTP Server.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    // Loads .env file settings before configuration can be read.
    dotenv::dotenv().ok();
    // AppConfig::load() implements the fail-fast principle for missing Production secrets.
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    // Sets the default log level. It prioritizes the RUST_LOG environment variable,
    // falling back to sensible defaults for local development.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cms_portal=debug,tower_http=info,axum=trace".into());

    // 3. Initialize Logging based on Environment
    // The structured logging format is dynamically selected based on the APP_ENV.
    match config.env {
        Env::Local => {
            // LOCAL: Pretty print output for human readability during local debugging.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // PROD: JSON format output for ingestion by centralized log aggregators.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Persistence Initialization
    // With a DATABASE_URL the app runs against Postgres; without one (local
    // only, AppConfig::load guarantees it is present in production) it falls
    // back to the in-memory repository so the portal can be tried without any
    // infrastructure.
    let repo: RepositoryState = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

            let repo = PostgresRepository::new(pool);

            // LOCAL-ONLY: apply the schema on startup as a development
            // convenience. Production databases are migrated explicitly.
            if config.env == Env::Local {
                repo.ensure_schema()
                    .await
                    .expect("FATAL: Failed to apply database schema.");
            }

            Arc::new(repo) as RepositoryState
        }
        None => {
            tracing::info!("DATABASE_URL not set, using the in-memory repository");
            Arc::new(MemoryRepository::new()) as RepositoryState
        }
    };

    // 5. Media Storage Initialization
    // Image bytes land on the local filesystem under the configured root.
    let media = Arc::new(FsMediaStorage::new(&config.media_root)) as MediaState;

    // 6. Template Engine Initialization
    // Panics on a malformed embedded template, which is a build defect.
    let templates = Arc::new(TemplateEngine::new()) as TemplateState;

    // 7. Unified State Assembly
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        repo,
        media,
        templates,
        config,
    };

    // 8. Router and Server Startup
    let app = create_router(app_state);

    // Binds the TCP listener and initiates the HTTP server.
    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind listen address.");

    tracing::info!("HTTP server bound successfully.");
    tracing::info!("Listening on {}", bind_addr);
    tracing::info!(
        "API documentation (Swagger UI) available at: http://localhost:3000/swagger-ui"
    );

    // The long-running Axum server process.
    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
