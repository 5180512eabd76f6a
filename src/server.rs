//! HTTP server initialization and runtime setup.
//!
//! Handles database pools, the fast store, background tasks and the Axum
//! server lifecycle.

use crate::config::Config;
use crate::domain::click_worker::{run_background_worker, run_flush_timer};
use crate::infrastructure::cache::{FastStore, MemoryStore, RedisStore};
use crate::infrastructure::persistence::{PgClickRepository, PgLinkRepository};
use crate::routes::app_router;
use crate::state::AppState;

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - PostgreSQL pools (links, and analytics when configured separately)
/// - Migrations
/// - Redis fast store (or the in-memory fallback)
/// - Background worker and flush timer
/// - Axum HTTP server
///
/// On SIGINT/SIGTERM the server stops accepting requests, the job queue is
/// drained and the click buffer is flushed one last time.
///
/// # Errors
///
/// Returns an error if:
/// - Database connection or migration fails
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let pool = connect_pool(&config, &config.database_url).await?;
    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let analytics_pool = if config.analytics_database_url == config.database_url {
        pool.clone()
    } else {
        let analytics = connect_pool(&config, &config.analytics_database_url).await?;
        sqlx::migrate!("./migrations")
            .run(&analytics)
            .await
            .context("Failed to run analytics migrations")?;
        tracing::info!("Connected to analytics database");
        analytics
    };

    let store = connect_store(&config).await;

    let links = Arc::new(PgLinkRepository::new(Arc::new(pool)));
    let clicks = Arc::new(PgClickRepository::new(Arc::new(analytics_pool)));

    let parts = AppState::build(&config, store, links, clicks);
    let buffer = Arc::clone(&parts.state.buffer);

    if let Err(e) = buffer.recover().await {
        tracing::warn!("Could not read the staging list: {}", e);
    }

    let worker = tokio::spawn(run_background_worker(
        parts.jobs_rx,
        parts.job_context,
        config.background_worker_concurrency,
    ));
    tracing::info!("Background worker started");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let flusher = tokio::spawn(run_flush_timer(
        Arc::clone(&buffer),
        config.flush_interval(),
        shutdown_rx,
    ));

    let app = app_router(parts.state);

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped, draining background jobs");

    // The router held the last job senders; the worker exits once it drains.
    if let Err(e) = worker.await {
        tracing::error!("Background worker failed: {}", e);
    }

    let _ = shutdown_tx.send(true);
    if let Err(e) = flusher.await {
        tracing::error!("Flush timer failed: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn connect_pool(config: &Config, url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime))
        .connect(url)
        .await
        .context("Failed to connect to PostgreSQL")
}

async fn connect_store(config: &Config) -> Arc<dyn FastStore> {
    let Some(redis_url) = &config.redis_url else {
        tracing::info!("Fast store: in-memory (single process only)");
        return Arc::new(MemoryStore::new());
    };

    match RedisStore::connect(redis_url).await {
        Ok(redis) => {
            tracing::info!("Fast store: Redis");
            Arc::new(redis)
        }
        Err(e) => {
            tracing::warn!("Failed to connect to Redis: {}. Using in-memory store.", e);
            Arc::new(MemoryStore::new())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!("Failed to listen for SIGTERM: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
