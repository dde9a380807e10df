//! Stock and ledger use cases exposed to the HTTP surface

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use crate::domain::errors::{CatalogError, CatalogResult};
use crate::domain::product::Product;
use crate::domain::repositories::{CatalogRepository, InventoryRepository};
use crate::domain::transaction::{
    EarningsSummary, PurchaseRequest, SaleRequest, Transaction, TransactionKind, validate_quantity,
};

pub struct InventoryService {
    inventory: Arc<dyn InventoryRepository>,
    catalog: Arc<dyn CatalogRepository>,
}

impl InventoryService {
    pub fn new(inventory: Arc<dyn InventoryRepository>, catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { inventory, catalog }
    }

    pub async fn register_sale(&self, request: &SaleRequest) -> CatalogResult<Transaction> {
        request.validate()?;
        self.inventory.register_sale(request).await
    }

    pub async fn register_purchase(&self, request: &PurchaseRequest) -> CatalogResult<Transaction> {
        request.validate()?;
        self.inventory.register_purchase(request).await
    }

    pub async fn adjust_stock(&self, product_id: i64, quantity: i64, kind: TransactionKind) -> CatalogResult<Product> {
        validate_quantity(quantity)?;
        let product = self.inventory.adjust_stock(product_id, quantity, kind).await?;
        info!("📦 {} of {} units on {}: stock {}", kind, quantity, product.name, product.stock);
        Ok(product)
    }

    pub async fn low_stock_products(&self) -> CatalogResult<Vec<Product>> {
        self.catalog.low_stock_products().await
    }

    /// Sales totals for `[from, to]`
    pub async fn earnings(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> CatalogResult<EarningsSummary> {
        if from > to {
            return Err(CatalogError::Validation(format!(
                "report period starts ({from}) after it ends ({to})"
            )));
        }
        self.inventory.earnings(from, to).await
    }
}
