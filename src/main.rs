use blog_portal::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
    storage::{LocalDiskStorage, StorageService, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// The asynchronous entry point, responsible for initializing all core
/// components: configuration, logging, database, storage, and the HTTP
/// server.
#[tokio::main]
async fn main() {
    // 1. Configuration & environment loading (fail-fast).
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging filter setup. RUST_LOG wins, with sensible defaults for
    // local development.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "blog_portal=debug,tower_http=info,axum=trace".into());

    // 3. Structured logging format selected by environment: pretty output
    // for humans locally, JSON for log aggregators in production.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database initialization (Postgres connection pool).
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 5. Storage initialization: the upload directory must exist before the
    // first image arrives, and is statically served by the router.
    let disk = LocalDiskStorage::new(config.upload_dir.clone(), config.upload_url_prefix.clone());
    disk.ensure_upload_dir().await;
    let storage = Arc::new(disk) as StorageState;

    // 6. Unified state assembly.
    let port = config.port;
    let app_state = AppState {
        repo,
        storage,
        config,
    };

    // 7. Router and server startup.
    let app = create_router(app_state);

    let listener = TcpListener::bind(("0.0.0.0", port)).await.unwrap();

    tracing::info!("HTTP server bound successfully.");
    tracing::info!("Listening on 0.0.0.0:{}", port);
    tracing::info!(
        "API Documentation (Swagger UI) available at: http://localhost:{}/swagger-ui",
        port
    );

    axum::serve(listener, app).await.unwrap();
}
