//! HTTP command surface
//!
//! Manual sync trigger and status, the scraped brand tree, and the inventory
//! endpoints the sync pipeline feeds.

pub mod error;
pub mod inventory_commands;
pub mod notification_commands;
pub mod sync_commands;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::application::AppState;

pub use error::{ApiError, ApiResult};

async fn health() -> &'static str {
    "ok"
}

/// Builds the application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/sync", post(sync_commands::trigger_sync))
        .route("/sync/status", get(sync_commands::sync_status))
        .route("/scraper/brands", get(sync_commands::brand_tree))
        .route("/products/low-stock", get(inventory_commands::low_stock_products))
        .route("/transactions/sale", post(inventory_commands::register_sale))
        .route("/transactions/purchase", post(inventory_commands::register_purchase))
        .route("/reports/earnings", get(inventory_commands::earnings))
        .route("/notifications/unread", get(notification_commands::unread_notifications))
        .route("/notifications/read-all", post(notification_commands::mark_all_notifications_read))
        .route("/notifications/:id/read", post(notification_commands::mark_notification_read))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
