//! Catalog entities: scraped storefront records, persisted products and the
//! brand/category tree discovered on the site.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category used when no other source yields one
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Brand used when neither the listing nor the crawl context names one
pub const UNBRANDED: &str = "Unbranded";

/// Which step of the category fallback chain produced a product's category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategorySource {
    /// The category page the product was listed on
    Context,
    ContainerHeading,
    CategoryLink,
    Breadcrumb,
    ProductUrl,
    Fallback,
}

impl fmt::Display for CategorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Context => "context",
            Self::ContainerHeading => "container_heading",
            Self::CategoryLink => "category_link",
            Self::Breadcrumb => "breadcrumb",
            Self::ProductUrl => "product_url",
            Self::Fallback => "fallback",
        };
        f.write_str(label)
    }
}

/// Brand and category of the listing page being extracted, when known
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryContext {
    pub brand: Option<String>,
    pub category: Option<String>,
}

impl CategoryContext {
    pub fn new(brand: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            brand: Some(brand.into()),
            category: Some(category.into()),
        }
    }
}

/// One product as it appears on the storefront listing.
///
/// Validated at the extractor boundary: empty strings are normalised to
/// `None` and prices are already parsed with the configured locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedProduct {
    pub site_id: Option<String>,
    /// May be empty; the record is still emitted
    pub name: String,
    pub brand: Option<String>,
    pub category: String,
    pub category_source: CategorySource,
    pub description: Option<String>,
    pub regular_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub on_sale: bool,
    pub in_stock: bool,
    pub image_url: Option<String>,
    pub product_url: Option<String>,
    pub sku: Option<String>,
    /// Badge texts in page order, duplicates preserved
    pub labels: Vec<String>,
}

impl ScrapedProduct {
    /// SKU when present, otherwise the exact product name
    pub fn reconciliation_key(&self) -> ReconciliationKey {
        match self.sku.as_deref() {
            Some(sku) if !sku.trim().is_empty() => ReconciliationKey::Sku(sku.to_string()),
            _ => ReconciliationKey::Name(self.name.clone()),
        }
    }

    pub fn brand_or_default(&self) -> &str {
        self.brand.as_deref().unwrap_or(UNBRANDED)
    }
}

/// Identity used to match a scraped record against the stored catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReconciliationKey {
    Sku(String),
    Name(String),
}

impl fmt::Display for ReconciliationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sku(sku) => write!(f, "sku:{sku}"),
            Self::Name(name) => write!(f, "name:{name}"),
        }
    }
}

/// A product stored in the inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub sku: Option<String>,
    pub brand_id: i64,
    pub brand_name: String,
    pub category_id: i64,
    pub category_name: String,
    /// Acquisition cost
    pub purchase_price: Decimal,
    /// Storefront list price
    pub list_price: Decimal,
    /// Promotional price while on sale
    pub promo_price: Option<Decimal>,
    pub on_sale: bool,
    pub discount_percentage: Option<i32>,
    pub stock: i64,
    pub min_stock: i64,
    /// Site availability, independent of the local stock count
    pub in_stock: bool,
    pub image_url: Option<String>,
    pub product_url: Option<String>,
    pub labels: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub const fn is_low_stock(&self) -> bool {
        self.stock <= self.min_stock
    }
}

/// Catalog-owned fields that a sync may overwrite on an existing product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFields {
    pub name: String,
    pub description: Option<String>,
    pub brand: String,
    pub category: String,
    pub list_price: Decimal,
    pub promo_price: Option<Decimal>,
    pub on_sale: bool,
    pub discount_percentage: Option<i32>,
    pub in_stock: bool,
    pub image_url: Option<String>,
    pub product_url: Option<String>,
    pub labels: Vec<String>,
}

/// A product to be created from a scraped record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub sku: Option<String>,
    pub fields: CatalogFields,
    pub purchase_price: Decimal,
    pub stock: i64,
    pub min_stock: i64,
}

/// A category link found in the site's category widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryLink {
    pub name: String,
    pub url: String,
}

/// A brand with its categories, as discovered on the shop page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandNode {
    pub name: String,
    pub url: Option<String>,
    pub categories: Vec<CategoryLink>,
}

/// Outcome of crawling the whole site
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlReport {
    pub products: Vec<ScrapedProduct>,
    pub categories_total: usize,
    pub pages_fetched: usize,
    /// `brand / category` paths that still failed after the second pass
    pub failed_categories: Vec<String>,
}
