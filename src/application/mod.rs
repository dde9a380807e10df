//! Application layer - Use cases and application services
//!
//! Catalog synchronization and its scheduler, the inventory use cases and the
//! shared state the HTTP surface works against.

pub mod inventory_service;
pub mod scheduler;
pub mod state;
pub mod sync_service;

// Re-export commonly used items
pub use inventory_service::InventoryService;
pub use scheduler::SyncScheduler;
pub use state::AppState;
pub use sync_service::{CatalogSyncService, SyncCoordinator, SyncOutcome, SyncStats, SyncSummary, SyncTrigger};
