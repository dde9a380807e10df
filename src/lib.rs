//! Fragrance Stock - catalog sync and inventory backend
//!
//! Mirrors a WooCommerce storefront's catalog into the local inventory
//! database, keeps stock and the sale/purchase ledger, and exposes both over
//! a small HTTP API.

#![allow(clippy::uninlined_format_args)]

// Module declarations
pub mod application;
pub mod commands;
pub mod domain;
pub mod infrastructure;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};

use crate::application::{AppState, SyncScheduler};
use crate::infrastructure::logging::{init_logging_with_config, log_system_info};
use crate::infrastructure::{ConfigManager, DatabaseConnection, SiteCrawler};

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("❌ Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("🛑 Shutdown signal received");
}

/// Loads configuration, opens the database, starts the scheduler and serves
/// the HTTP API until Ctrl+C.
pub async fn run() -> Result<()> {
    let manager = ConfigManager::new()?;
    let mut config = manager.load_config().await?;
    config.apply_env_overrides();
    config.validate()?;

    init_logging_with_config(config.logging.clone())?;
    log_system_info();
    info!("Configuration loaded from {:?}", manager.config_path());

    let db = DatabaseConnection::new(
        &config.database.url,
        config.database.max_connections,
        config.database.busy_timeout_seconds,
    )
    .await?;
    db.migrate().await?;

    let crawler = SiteCrawler::from_config(&config.site, &config.crawler)?;
    let state = AppState::new(config.clone(), db.pool().clone(), Arc::new(crawler));

    let scheduler = if config.scheduler.enabled {
        let scheduler = SyncScheduler::from_config(state.coordinator.clone(), &config.scheduler)?;
        scheduler.start().await;
        Some(scheduler)
    } else {
        info!("Scheduler disabled, syncs run on demand only");
        None
    };

    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("🌍 HTTP API listening on {}", address);

    axum::serve(listener, commands::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    if let Some(scheduler) = scheduler {
        scheduler.stop().await;
    }
    db.close().await;
    info!("👋 Fragrance Stock stopped");
    Ok(())
}
