//! Domain module - Core business logic and entities
//!
//! Catalog entities, money value objects, the reconciliation engine and the
//! repository traits the application layer is written against.

pub mod errors;
pub mod notification;
pub mod product;
pub mod reconciliation;
pub mod repositories;
pub mod transaction;
pub mod value_objects;

// Re-export commonly used items
pub use errors::{CatalogError, CatalogResult, ItemFailure};
pub use notification::{Notification, NotificationKind, PlannedNotification};
pub use product::{
    BrandNode, CatalogFields, CategoryContext, CategoryLink, CategorySource,
    CrawlReport, Product, ProductDraft, ReconciliationKey, ScrapedProduct,
};
pub use reconciliation::{
    ApplyReport, CatalogSnapshot, Reconciliation, ReconciliationConfig, ReconciliationEngine,
    SyncMode, WritePlan,
};
pub use repositories::{CatalogRepository, CatalogSource, InventoryRepository, NotificationRepository};
pub use transaction::{
    EarningsSummary, PurchaseRequest, SaleRequest, Transaction, TransactionKind,
};
pub use value_objects::{PriceLocale, PriceParser};
