//! Shared application state handed to every HTTP handler
//!
//! Everything is behind an `Arc`, so cloning the state per request is cheap.

use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

use crate::application::inventory_service::InventoryService;
use crate::application::sync_service::{CatalogSyncService, SyncCoordinator};
use crate::domain::repositories::{CatalogRepository, CatalogSource, InventoryRepository, NotificationRepository};
use crate::infrastructure::catalog_repository::SqliteCatalogRepository;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::inventory_repository::SqliteInventoryRepository;
use crate::infrastructure::notification_repository::SqliteNotificationRepository;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub coordinator: Arc<SyncCoordinator>,
    /// Used directly for the brand tree endpoint
    pub source: Arc<dyn CatalogSource>,
    pub catalog: Arc<dyn CatalogRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub inventory: Arc<InventoryService>,
}

impl AppState {
    /// Wires the SQLite repositories around the given catalog source
    pub fn new(config: AppConfig, pool: SqlitePool, source: Arc<dyn CatalogSource>) -> Self {
        let pool = Arc::new(pool);
        let catalog: Arc<dyn CatalogRepository> = Arc::new(SqliteCatalogRepository::new(pool.clone()));
        let notifications: Arc<dyn NotificationRepository> = Arc::new(SqliteNotificationRepository::new(pool.clone()));
        let inventory: Arc<dyn InventoryRepository> = Arc::new(SqliteInventoryRepository::new(pool));
        Self::from_parts(config, source, catalog, notifications, inventory)
    }

    pub fn from_parts(
        config: AppConfig,
        source: Arc<dyn CatalogSource>,
        catalog: Arc<dyn CatalogRepository>,
        notifications: Arc<dyn NotificationRepository>,
        inventory: Arc<dyn InventoryRepository>,
    ) -> Self {
        let service = CatalogSyncService::new(source.clone(), catalog.clone(), config.sync.reconciliation());
        info!("Application state initialized");
        Self {
            coordinator: Arc::new(SyncCoordinator::new(service)),
            inventory: Arc::new(InventoryService::new(inventory, catalog.clone())),
            config: Arc::new(config),
            source,
            catalog,
            notifications,
        }
    }
}
