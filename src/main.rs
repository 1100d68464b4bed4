use gaming_news_cms::{
    AppState,
    config::{AppConfig, Env, StorageConfig},
    create_router, identity,
    memory::MemoryRepository,
    repository::{PostgresRepository, RepositoryState},
    storage::{LocalDiskStorage, S3StorageClient, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, picks the store and the storage backend,
/// seeds the administrator and serves HTTP until SIGINT or SIGTERM.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production secrets).
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: pretty locally, JSON in production.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "gaming_news_cms=debug,tower_http=info".into());

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

    // 3. Store: Postgres when configured, in-memory otherwise.
    let repo: RepositoryState = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

            let repo = PostgresRepository::new(pool);
            repo.migrate()
                .await
                .expect("FATAL: Database migrations failed.");
            tracing::info!("Using Postgres store");
            Arc::new(repo) as RepositoryState
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store (data is lost on exit)");
            Arc::new(MemoryRepository::new()) as RepositoryState
        }
    };

    // 4. Blob storage for article images.
    let storage: StorageState = match &config.storage {
        StorageConfig::LocalDisk { upload_dir } => {
            Arc::new(LocalDiskStorage::new(upload_dir)) as StorageState
        }
        StorageConfig::S3 {
            endpoint,
            region,
            access_key,
            secret_key,
            bucket,
        } => Arc::new(S3StorageClient::new(
            endpoint, region, access_key, secret_key, bucket,
        )) as StorageState,
    };
    storage
        .ensure_ready()
        .await
        .expect("FATAL: Upload storage could not be prepared.");

    // 5. Administrator seed.
    if let Some(seed) = &config.admin {
        identity::ensure_admin(repo.as_ref(), seed, config.bcrypt_cost)
            .await
            .expect("FATAL: Could not seed the administrator account.");
    }

    // 6. Router and server.
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState {
        repo,
        storage,
        config,
    });

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Could not bind BIND_ADDR.");

    tracing::info!("Listening on {bind_addr}");
    tracing::info!("API Documentation (Swagger UI) available at: http://{bind_addr}/swagger-ui");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("FATAL: HTTP server error.");

    tracing::info!("Server stopped");
}

/// Resolves on SIGINT (Ctrl+C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
