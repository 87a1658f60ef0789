//! Book catalog server - REST API for a book catalog

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use book_catalog::{
    api,
    config::{AppConfig, StorageBackend},
    repository::{BookStore, InMemoryBookRepository, PgBookRepository},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("book_catalog={},tower_http=debug", config.logging.level).into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting book catalog v{}", env!("CARGO_PKG_VERSION"));

    let store = match open_store(&config).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to open storage: {:#}", e);
            return Err(e);
        }
    };

    let addr = SocketAddr::new(
        config
            .server
            .host
            .parse()
            .with_context(|| format!("Invalid host address {}", config.server.host))?,
        config.server.port,
    );

    let app = api::create_router(AppState::new(store));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Connect to the configured backend and bring its schema up to date
async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn BookStore>> {
    match config.database.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, books are lost on exit");
            Ok(Arc::new(InMemoryBookRepository::new()))
        }
        StorageBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .min_connections(config.database.min_connections)
                .connect(&config.database.url)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Connected to database");

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run database migrations")?;
            tracing::info!("Database migrations completed");

            Ok(Arc::new(PgBookRepository::new(pool)))
        }
    }
}
