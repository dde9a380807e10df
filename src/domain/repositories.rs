//! Repository and source interfaces for the catalog domain
//!
//! Implementations live in the infrastructure layer; application services
//! depend only on these traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::CatalogResult;
use crate::domain::notification::Notification;
use crate::domain::product::{BrandNode, CrawlReport, Product};
use crate::domain::reconciliation::{ApplyReport, CatalogSnapshot, SyncMode, WritePlan};
use crate::domain::transaction::{
    EarningsSummary, PurchaseRequest, SaleRequest, Transaction, TransactionKind,
};

/// Where scraped catalog data comes from
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Crawls every brand/category and returns the merged listing
    async fn fetch_catalog(&self) -> CatalogResult<CrawlReport>;

    /// Brand to category tree as published by the site
    async fn brand_tree(&self) -> CatalogResult<Vec<BrandNode>>;
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn load_snapshot(&self) -> CatalogResult<CatalogSnapshot>;
    async fn apply_write_plan(&self, plan: &WritePlan, mode: SyncMode) -> CatalogResult<ApplyReport>;
    async fn find_product(&self, product_id: i64) -> CatalogResult<Option<Product>>;
    async fn find_product_by_sku(&self, sku: &str) -> CatalogResult<Option<Product>>;
    /// Products whose stock is at or below their minimum, lowest stock first
    async fn low_stock_products(&self) -> CatalogResult<Vec<Product>>;
    async fn count_products(&self) -> CatalogResult<i64>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn unread(&self) -> CatalogResult<Vec<Notification>>;
    async fn count_unread(&self) -> CatalogResult<i64>;
    async fn mark_read(&self, notification_id: i64) -> CatalogResult<()>;
    /// Returns how many notifications were marked
    async fn mark_all_read(&self) -> CatalogResult<u64>;
}

#[async_trait]
pub trait InventoryRepository: Send + Sync {
    async fn adjust_stock(
        &self,
        product_id: i64,
        quantity: i64,
        kind: TransactionKind,
    ) -> CatalogResult<Product>;
    async fn register_sale(&self, request: &SaleRequest) -> CatalogResult<Transaction>;
    async fn register_purchase(&self, request: &PurchaseRequest) -> CatalogResult<Transaction>;
    async fn earnings(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> CatalogResult<EarningsSummary>;
    async fn count_transactions(&self, product_id: i64) -> CatalogResult<i64>;
}
