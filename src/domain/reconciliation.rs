//! Reconciliation of a scraped catalog against the stored inventory.
//!
//! [`ReconciliationEngine::reconcile`] is pure: it classifies every scraped
//! record as new, modified or unchanged and produces a [`WritePlan`] that the
//! persistence layer applies. Nothing here performs I/O.

#![allow(clippy::uninlined_format_args)]

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use tracing::{debug, info};

use super::errors::{CatalogError, ItemFailure};
use super::notification::PlannedNotification;
use super::product::{
    CatalogFields, CategorySource, Product, ProductDraft, ReconciliationKey, ScrapedProduct,
};
use super::value_objects::{discount_percentage, estimated_purchase_price, round_money};

/// How the gateway groups writes into transactions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// One transaction for the whole run
    #[default]
    Full,
    /// One transaction per product
    Incremental,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => f.write_str("full"),
            Self::Incremental => f.write_str("incremental"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// Fraction of the list price used as estimated cost for new products
    pub purchase_price_ratio: Decimal,
    pub default_min_stock: i64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            purchase_price_ratio: Decimal::new(70, 2),
            default_min_stock: 3,
        }
    }
}

/// Stored products indexed by reconciliation key
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    by_sku: HashMap<String, Product>,
    by_name: HashMap<String, Vec<Product>>,
    len: usize,
}

enum Lookup<'a> {
    Found(&'a Product),
    Missing,
    Ambiguous(usize),
}

impl CatalogSnapshot {
    pub fn new(products: Vec<Product>) -> Self {
        let len = products.len();
        let mut by_sku = HashMap::new();
        let mut by_name: HashMap<String, Vec<Product>> = HashMap::new();

        for product in products {
            if let Some(sku) = product.sku.as_deref().filter(|s| !s.is_empty()) {
                by_sku.insert(sku.to_string(), product.clone());
            }
            by_name.entry(product.name.clone()).or_default().push(product);
        }

        Self { by_sku, by_name, len }
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn lookup(&self, key: &ReconciliationKey) -> Lookup<'_> {
        match key {
            ReconciliationKey::Sku(sku) => self
                .by_sku
                .get(sku)
                .map_or(Lookup::Missing, Lookup::Found),
            ReconciliationKey::Name(name) => match self.by_name.get(name).map(Vec::as_slice) {
                None | Some([]) => Lookup::Missing,
                Some([single]) => Lookup::Found(single),
                Some(many) => Lookup::Ambiguous(many.len()),
            },
        }
    }
}

/// One observed difference between a stored product and its scraped record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum FieldChange {
    ListPrice { from: Decimal, to: Decimal },
    PromoPrice { from: Option<Decimal>, to: Option<Decimal> },
    Availability { from: bool, to: bool },
    Category { from: String, to: String },
    Brand { from: String, to: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub key: String,
    pub name: String,
    pub list_price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedProduct {
    pub product_id: i64,
    pub key: String,
    pub name: String,
    pub changes: Vec<FieldChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedCreate {
    pub key: String,
    pub draft: ProductDraft,
    pub notification: PlannedNotification,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedUpdate {
    pub product_id: i64,
    pub key: String,
    pub fields: CatalogFields,
    pub notification: Option<PlannedNotification>,
}

/// Writes computed by reconciliation, applied by the persistence gateway
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WritePlan {
    /// Brand names referenced by the planned writes
    pub brands: BTreeSet<String>,
    pub categories: BTreeSet<String>,
    pub creates: Vec<PlannedCreate>,
    pub updates: Vec<PlannedUpdate>,
}

impl WritePlan {
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty()
    }

    pub fn product_writes(&self) -> usize {
        self.creates.len() + self.updates.len()
    }

    pub fn notification_count(&self) -> usize {
        self.creates.len() + self.updates.iter().filter(|u| u.notification.is_some()).count()
    }

    fn reference(&mut self, fields: &CatalogFields) {
        self.brands.insert(fields.brand.clone());
        self.categories.insert(fields.category.clone());
    }
}

/// What the gateway actually wrote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub created: usize,
    pub updated: usize,
    pub notified: usize,
    pub failures: Vec<ItemFailure>,
}

/// Classification of one scrape against one snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reconciliation {
    pub new: Vec<ProductSummary>,
    pub modified: Vec<ModifiedProduct>,
    pub out_of_stock: Vec<ProductSummary>,
    pub unchanged: Vec<ProductSummary>,
    /// Records skipped because their key was already seen in this scrape
    pub duplicates: usize,
    pub failures: Vec<ItemFailure>,
    pub plan: WritePlan,
}

#[derive(Debug, Clone, Default)]
pub struct ReconciliationEngine {
    config: ReconciliationConfig,
}

impl ReconciliationEngine {
    pub const fn new(config: ReconciliationConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &ReconciliationConfig {
        &self.config
    }

    pub fn reconcile(&self, scraped: &[ScrapedProduct], snapshot: &CatalogSnapshot) -> Reconciliation {
        let mut result = Reconciliation::default();
        let mut seen: HashSet<ReconciliationKey> = HashSet::with_capacity(scraped.len());

        for item in scraped {
            let key = item.reconciliation_key();
            let key_label = key_value(&key).to_string();

            if !seen.insert(key.clone()) {
                result.duplicates += 1;
                debug!("Skipping repeated listing for {}", key);
                continue;
            }

            if key_label.trim().is_empty() {
                let err = CatalogError::Validation("product has neither SKU nor name".into());
                result.failures.push(ItemFailure::new(key_label, item.name.clone(), &err));
                continue;
            }

            match snapshot.lookup(&key) {
                Lookup::Missing => self.plan_create(&mut result, item, key_label),
                Lookup::Ambiguous(count) => {
                    let err = CatalogError::ReconciliationConflict {
                        key: key_label.clone(),
                        reason: format!("{} stored products share this name", count),
                    };
                    result.failures.push(ItemFailure::new(key_label, item.name.clone(), &err));
                }
                Lookup::Found(existing) => Self::compare(&mut result, item, existing, key_label),
            }
        }

        info!(
            "🔍 Reconciled {} scraped products against {} stored: {} new, {} modified, {} out of stock, {} unchanged, {} duplicates, {} failures",
            scraped.len(),
            snapshot.len(),
            result.new.len(),
            result.modified.len(),
            result.out_of_stock.len(),
            result.unchanged.len(),
            result.duplicates,
            result.failures.len()
        );

        result
    }

    fn plan_create(&self, result: &mut Reconciliation, item: &ScrapedProduct, key: String) {
        let list_price = item.regular_price.map_or(Decimal::ZERO, round_money);
        let promo_price = item.sale_price.map(round_money);
        let fields = CatalogFields {
            name: item.name.clone(),
            description: item.description.clone(),
            brand: item.brand_or_default().to_string(),
            category: item.category.clone(),
            list_price,
            promo_price,
            on_sale: promo_price.is_some(),
            discount_percentage: promo_price.and_then(|sale| discount_percentage(list_price, sale)),
            in_stock: item.in_stock,
            image_url: item.image_url.clone(),
            product_url: item.product_url.clone(),
            labels: item.labels.clone(),
        };
        let draft = ProductDraft {
            sku: item.sku.clone().filter(|s| !s.trim().is_empty()),
            purchase_price: estimated_purchase_price(list_price, self.config.purchase_price_ratio),
            stock: 0,
            min_stock: self.config.default_min_stock,
            fields,
        };

        result.new.push(ProductSummary {
            key: key.clone(),
            name: item.name.clone(),
            list_price: item.regular_price,
        });
        result.plan.reference(&draft.fields);
        result.plan.creates.push(PlannedCreate {
            key,
            notification: PlannedNotification::new_product(&item.name, list_price),
            draft,
        });
    }

    fn compare(result: &mut Reconciliation, item: &ScrapedProduct, existing: &Product, key: String) {
        let mut changes = Vec::new();
        let mut price_changed = false;

        // Prices are only compared when the regular amount parsed
        let (list_price, promo_price) = match item.regular_price.map(round_money) {
            Some(regular) => {
                let promo = item.sale_price.map(round_money);
                if regular != existing.list_price {
                    changes.push(FieldChange::ListPrice {
                        from: existing.list_price,
                        to: regular,
                    });
                    price_changed = true;
                }
                if promo != existing.promo_price {
                    changes.push(FieldChange::PromoPrice {
                        from: existing.promo_price,
                        to: promo,
                    });
                    price_changed = true;
                }
                (regular, promo)
            }
            None => (existing.list_price, existing.promo_price),
        };

        if item.in_stock != existing.in_stock {
            changes.push(FieldChange::Availability {
                from: existing.in_stock,
                to: item.in_stock,
            });
        }

        let category = if item.category_source == CategorySource::Fallback {
            existing.category_name.clone()
        } else {
            item.category.clone()
        };
        if category != existing.category_name {
            changes.push(FieldChange::Category {
                from: existing.category_name.clone(),
                to: category.clone(),
            });
        }

        let brand = item.brand.clone().unwrap_or_else(|| existing.brand_name.clone());
        if brand != existing.brand_name {
            changes.push(FieldChange::Brand {
                from: existing.brand_name.clone(),
                to: brand.clone(),
            });
        }

        let summary = ProductSummary {
            key: key.clone(),
            name: item.name.clone(),
            list_price: item.regular_price,
        };

        if changes.is_empty() {
            result.unchanged.push(summary);
            return;
        }

        if existing.in_stock && !item.in_stock {
            result.out_of_stock.push(summary);
        }

        let notification = price_changed.then(|| {
            PlannedNotification::price_change(
                &item.name,
                existing.promo_price.unwrap_or(existing.list_price),
                promo_price.unwrap_or(list_price),
            )
        });

        let fields = CatalogFields {
            name: item.name.clone(),
            description: item.description.clone(),
            brand,
            category,
            list_price,
            promo_price,
            on_sale: promo_price.is_some(),
            discount_percentage: promo_price.and_then(|sale| discount_percentage(list_price, sale)),
            in_stock: item.in_stock,
            image_url: item.image_url.clone(),
            product_url: item.product_url.clone(),
            labels: item.labels.clone(),
        };

        debug!("Product {} changed: {:?}", key, changes);
        result.modified.push(ModifiedProduct {
            product_id: existing.id,
            key: key.clone(),
            name: item.name.clone(),
            changes,
        });
        result.plan.reference(&fields);
        result.plan.updates.push(PlannedUpdate {
            product_id: existing.id,
            key,
            fields,
            notification,
        });
    }
}

fn key_value(key: &ReconciliationKey) -> &str {
    match key {
        ReconciliationKey::Sku(value) | ReconciliationKey::Name(value) => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::notification::NotificationKind;
    use crate::domain::product::UNCATEGORIZED;
    use chrono::Utc;

    fn scraped(sku: Option<&str>, name: &str, regular: i64, sale: Option<i64>) -> ScrapedProduct {
        ScrapedProduct {
            site_id: None,
            name: name.to_string(),
            brand: Some("Saphirus".into()),
            category: "Aromatizantes".into(),
            category_source: CategorySource::Context,
            description: None,
            regular_price: Some(Decimal::from(regular)),
            sale_price: sale.map(Decimal::from),
            on_sale: sale.is_some(),
            in_stock: true,
            image_url: None,
            product_url: None,
            sku: sku.map(str::to_string),
            labels: Vec::new(),
        }
    }

    fn stored(id: i64, sku: Option<&str>, name: &str, list: i64, promo: Option<i64>) -> Product {
        let now = Utc::now();
        Product {
            id,
            name: name.to_string(),
            description: None,
            sku: sku.map(str::to_string),
            brand_id: 1,
            brand_name: "Saphirus".into(),
            category_id: 1,
            category_name: "Aromatizantes".into(),
            purchase_price: Decimal::from(list) * Decimal::new(7, 1),
            list_price: Decimal::from(list),
            promo_price: promo.map(Decimal::from),
            on_sale: promo.is_some(),
            discount_percentage: None,
            stock: 5,
            min_stock: 3,
            in_stock: true,
            image_url: None,
            product_url: None,
            labels: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn unchanged_products_produce_an_empty_plan() {
        let snapshot = CatalogSnapshot::new(vec![stored(1, Some("A1"), "Aroma", 10_000, None)]);
        let result = ReconciliationEngine::default()
            .reconcile(&[scraped(Some("A1"), "Aroma", 10_000, None)], &snapshot);

        assert_eq!(result.unchanged.len(), 1);
        assert!(result.plan.is_empty());
        assert!(result.plan.brands.is_empty());
        assert_eq!(result.plan.notification_count(), 0);
    }

    #[test]
    fn unknown_sku_plans_one_create_with_notification() {
        let snapshot = CatalogSnapshot::new(vec![]);
        let result = ReconciliationEngine::default()
            .reconcile(&[scraped(Some("N1"), "Nuevo", 10_000, Some(8_000))], &snapshot);

        assert_eq!(result.plan.creates.len(), 1);
        let create = &result.plan.creates[0];
        assert_eq!(create.notification.kind, NotificationKind::NewProduct);
        assert_eq!(create.draft.fields.discount_percentage, Some(20));
        assert_eq!(create.draft.purchase_price, Decimal::from(7_000));
        assert_eq!(create.draft.stock, 0);
        assert_eq!(create.draft.min_stock, 3);
        assert!(result.plan.brands.contains("Saphirus"));
        assert!(result.plan.categories.contains("Aromatizantes"));
    }

    #[test]
    fn price_change_is_flagged_with_notification() {
        let snapshot = CatalogSnapshot::new(vec![stored(7, Some("A1"), "Aroma", 10_000, None)]);
        let result = ReconciliationEngine::default()
            .reconcile(&[scraped(Some("A1"), "Aroma", 12_000, None)], &snapshot);

        assert_eq!(result.modified.len(), 1);
        let update = &result.plan.updates[0];
        assert_eq!(update.product_id, 7);
        assert_eq!(update.fields.list_price, Decimal::from(12_000));
        let notification = update.notification.as_ref().unwrap();
        assert_eq!(notification.kind, NotificationKind::PriceChange);
        assert!(notification.message.contains("$10000.00 -> $12000.00"));
    }

    #[test]
    fn availability_flip_is_out_of_stock_without_price_notification() {
        let snapshot = CatalogSnapshot::new(vec![stored(3, Some("A1"), "Aroma", 10_000, None)]);
        let mut item = scraped(Some("A1"), "Aroma", 10_000, None);
        item.in_stock = false;
        let result = ReconciliationEngine::default().reconcile(&[item], &snapshot);

        assert_eq!(result.out_of_stock.len(), 1);
        assert_eq!(result.modified.len(), 1);
        assert!(result.plan.updates[0].notification.is_none());
    }

    #[test]
    fn unparsable_regular_price_is_never_a_price_change() {
        let snapshot = CatalogSnapshot::new(vec![stored(3, Some("A1"), "Aroma", 10_000, Some(9_000))]);
        let mut item = scraped(Some("A1"), "Aroma", 0, None);
        item.regular_price = None;
        let result = ReconciliationEngine::default().reconcile(&[item], &snapshot);

        assert_eq!(result.unchanged.len(), 1);
        assert!(result.plan.is_empty());
    }

    #[test]
    fn repeated_keys_count_as_duplicates() {
        let snapshot = CatalogSnapshot::new(vec![]);
        let items = [
            scraped(Some("D1"), "Difusor", 5_000, None),
            scraped(Some("D1"), "Difusor", 5_000, None),
        ];
        let result = ReconciliationEngine::default().reconcile(&items, &snapshot);

        assert_eq!(result.plan.creates.len(), 1);
        assert_eq!(result.duplicates, 1);
    }

    #[test]
    fn ambiguous_name_match_is_an_item_failure() {
        let snapshot = CatalogSnapshot::new(vec![
            stored(1, None, "Aroma", 10_000, None),
            stored(2, None, "Aroma", 11_000, None),
        ]);
        let items = [
            scraped(None, "Aroma", 10_000, None),
            scraped(None, "Otro", 1_000, None),
        ];
        let result = ReconciliationEngine::default().reconcile(&items, &snapshot);

        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].kind, "reconciliation_conflict");
        assert_eq!(result.plan.creates.len(), 1);
    }

    #[test]
    fn fallback_category_does_not_overwrite_stored_category() {
        let snapshot = CatalogSnapshot::new(vec![stored(1, Some("A1"), "Aroma", 10_000, None)]);
        let mut item = scraped(Some("A1"), "Aroma", 10_000, None);
        item.category = UNCATEGORIZED.into();
        item.category_source = CategorySource::Fallback;
        let result = ReconciliationEngine::default().reconcile(&[item], &snapshot);

        assert_eq!(result.unchanged.len(), 1);
    }

    #[test]
    fn nameless_product_without_sku_fails() {
        let result = ReconciliationEngine::default()
            .reconcile(&[scraped(None, "", 1_000, None)], &CatalogSnapshot::default());
        assert_eq!(result.failures.len(), 1);
        assert!(result.plan.is_empty());
    }
}
