use actix::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod actors;
mod config;
mod handlers;
mod http;
mod metrics;
mod models;
mod store;
mod utils;

use actors::{CoordinatorActor, GetHealthCheckActor, Shutdown};
use config::AppConfig;
use handlers::{AnalyticsUpdater, NotificationGenerator};
use http::{start_http_server, AppState};
use store::{DocumentStore, MemoryStore};

#[actix::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,event_triggers=debug")),
        )
        .init();

    tracing::info!("🚀 Starting event trigger service");

    let config = AppConfig::from_env();
    tracing::info!(?config, "Configuration loaded");

    // Single shared store handle, injected into every component
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());

    tracing::info!("Initializing metrics");
    let metrics = Arc::new(metrics::Metrics::new()?);

    let updater = Arc::new(AnalyticsUpdater::new(store.clone()));
    let generator = Arc::new(NotificationGenerator::new(
        store.clone(),
        config.window_hours,
    ));

    tracing::info!("Starting coordinator actor");
    let coordinator = CoordinatorActor::new(
        store.clone(),
        updater,
        generator.clone(),
        metrics.clone(),
        Duration::from_secs(config.job_interval_hours * 60 * 60),
    )
    .start();

    let health = coordinator
        .send(GetHealthCheckActor)
        .await?
        .expect("Health check actor should be started by coordinator");

    start_http_server(
        AppState {
            store,
            generator,
            metrics,
            health,
        },
        (config.http_bind.clone(), config.http_port),
    )
    .await?;

    tracing::info!("HTTP server stopped, shutting down actors");
    if let Err(err) = coordinator.send(Shutdown).await? {
        tracing::warn!(error = %err, "Coordinator shutdown reported an error");
    }

    tracing::info!("Service shutdown complete");
    Ok(())
}
