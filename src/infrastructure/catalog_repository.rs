//! SQLite persistence gateway for the synchronized catalog
//!
//! Applies a reconciliation [`WritePlan`] either as one transaction
//! ([`SyncMode::Full`]) or as one transaction per product
//! ([`SyncMode::Incremental`]). Brands and categories are find-or-create and
//! tolerate a concurrent insert of the same name.

#![allow(clippy::uninlined_format_args)]

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::errors::{CatalogError, CatalogResult, ItemFailure};
use crate::domain::product::{CatalogFields, Product};
use crate::domain::reconciliation::{
    ApplyReport, CatalogSnapshot, PlannedCreate, PlannedUpdate, SyncMode, WritePlan,
};
use crate::domain::repositories::CatalogRepository;
use crate::domain::value_objects::{format_money, parse_stored_money};
use crate::infrastructure::database_connection::{format_timestamp, is_unique_violation, parse_timestamp};
use crate::infrastructure::notification_repository::insert_notification;

/// Joined product projection shared by every product query
pub(crate) const PRODUCT_SELECT: &str = r"
    SELECT p.id, p.nombre, p.descripcion, p.sku,
           COALESCE(p.marca_id, 0) AS marca_id, COALESCE(m.nombre, 'Unbranded') AS marca_nombre,
           COALESCE(p.categoria_id, 0) AS categoria_id, COALESCE(c.nombre, 'Uncategorized') AS categoria_nombre,
           p.precio_compra, p.precio_venta, p.precio_oferta, p.en_oferta, p.porcentaje_descuento,
           p.stock, p.stock_minimo, p.en_stock, p.imagen_url, p.product_url, p.labels,
           p.created_at, p.updated_at
    FROM productos p
    LEFT JOIN marcas m ON m.id = p.marca_id
    LEFT JOIN categorias c ON c.id = p.categoria_id
";

pub(crate) fn product_from_row(row: &SqliteRow) -> CatalogResult<Product> {
    let purchase_price: String = row.try_get("precio_compra")?;
    let list_price: String = row.try_get("precio_venta")?;
    let promo_price: Option<String> = row.try_get("precio_oferta")?;
    let labels: String = row.try_get("labels")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Product {
        id: row.try_get("id")?,
        name: row.try_get("nombre")?,
        description: row.try_get("descripcion")?,
        sku: row.try_get("sku")?,
        brand_id: row.try_get("marca_id")?,
        brand_name: row.try_get("marca_nombre")?,
        category_id: row.try_get("categoria_id")?,
        category_name: row.try_get("categoria_nombre")?,
        purchase_price: parse_stored_money(&purchase_price)?,
        list_price: parse_stored_money(&list_price)?,
        promo_price: promo_price.as_deref().map(parse_stored_money).transpose()?,
        on_sale: row.try_get("en_oferta")?,
        discount_percentage: row.try_get("porcentaje_descuento")?,
        stock: row.try_get("stock")?,
        min_stock: row.try_get("stock_minimo")?,
        in_stock: row.try_get("en_stock")?,
        image_url: row.try_get("imagen_url")?,
        product_url: row.try_get("product_url")?,
        labels: serde_json::from_str(&labels)
            .map_err(|e| CatalogError::parse("labels", e.to_string()))?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

pub(crate) async fn fetch_product(conn: &mut SqliteConnection, product_id: i64) -> CatalogResult<Option<Product>> {
    let query = format!("{} WHERE p.id = ?", PRODUCT_SELECT);
    sqlx::query(&query)
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?
        .as_ref()
        .map(product_from_row)
        .transpose()
}

async fn fetch_product_id_by_sku(conn: &mut SqliteConnection, sku: &str) -> CatalogResult<Option<i64>> {
    Ok(sqlx::query_scalar::<_, i64>("SELECT id FROM productos WHERE sku = ?")
        .bind(sku)
        .fetch_optional(&mut *conn)
        .await?)
}

fn labels_json(labels: &[String]) -> CatalogResult<String> {
    serde_json::to_string(labels).map_err(|e| CatalogError::parse("labels", e.to_string()))
}

#[derive(Debug, Clone, Copy)]
enum NamedTable {
    Brands,
    Categories,
}

impl NamedTable {
    const fn table(self) -> &'static str {
        match self {
            Self::Brands => "marcas",
            Self::Categories => "categorias",
        }
    }

    const fn entity(self) -> &'static str {
        match self {
            Self::Brands => "brand",
            Self::Categories => "category",
        }
    }
}

/// Select by name, insert when missing, re-select on a unique conflict
async fn ensure_named(conn: &mut SqliteConnection, kind: NamedTable, name: &str) -> CatalogResult<i64> {
    let select = format!("SELECT id FROM {} WHERE nombre = ?", kind.table());
    if let Some(id) = sqlx::query_scalar::<_, i64>(&select)
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?
    {
        return Ok(id);
    }

    let now = format_timestamp(Utc::now());
    let insert = format!("INSERT INTO {} (nombre, created_at, updated_at) VALUES (?, ?, ?)", kind.table());
    match sqlx::query(&insert).bind(name).bind(&now).bind(&now).execute(&mut *conn).await {
        Ok(done) => {
            debug!("Created {} '{}'", kind.entity(), name);
            Ok(done.last_insert_rowid())
        }
        Err(e) if is_unique_violation(&e) => {
            debug!("{} '{}' inserted concurrently, re-reading", kind.entity(), name);
            sqlx::query_scalar::<_, i64>(&select)
                .bind(name)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| CatalogError::not_found(kind.entity(), name))
        }
        Err(e) => Err(e.into()),
    }
}

/// Brand and category ids referenced by a plan
#[derive(Debug, Default)]
struct ReferenceIds {
    brands: HashMap<String, i64>,
    categories: HashMap<String, i64>,
}

impl ReferenceIds {
    async fn resolve(conn: &mut SqliteConnection, plan: &WritePlan) -> CatalogResult<Self> {
        let mut ids = Self::default();
        for brand in &plan.brands {
            let id = ensure_named(conn, NamedTable::Brands, brand).await?;
            ids.brands.insert(brand.clone(), id);
        }
        for category in &plan.categories {
            let id = ensure_named(conn, NamedTable::Categories, category).await?;
            ids.categories.insert(category.clone(), id);
        }
        Ok(ids)
    }

    /// Ids for one product, creating names the plan did not list
    async fn for_fields(&mut self, conn: &mut SqliteConnection, fields: &CatalogFields) -> CatalogResult<(i64, i64)> {
        let brand_id = match self.brands.get(&fields.brand) {
            Some(id) => *id,
            None => {
                let id = ensure_named(conn, NamedTable::Brands, &fields.brand).await?;
                self.brands.insert(fields.brand.clone(), id);
                id
            }
        };
        let category_id = match self.categories.get(&fields.category) {
            Some(id) => *id,
            None => {
                let id = ensure_named(conn, NamedTable::Categories, &fields.category).await?;
                self.categories.insert(fields.category.clone(), id);
                id
            }
        };
        Ok((brand_id, category_id))
    }
}

/// Writes every catalog-owned column of one product in a single statement
async fn update_catalog_fields(
    conn: &mut SqliteConnection,
    product_id: i64,
    fields: &CatalogFields,
    brand_id: i64,
    category_id: i64,
) -> CatalogResult<()> {
    let done = sqlx::query(
        r"
        UPDATE productos SET
            nombre = ?, descripcion = ?, marca_id = ?, categoria_id = ?,
            precio_venta = ?, precio_oferta = ?, en_oferta = ?, porcentaje_descuento = ?,
            en_stock = ?, imagen_url = ?, product_url = ?, labels = ?, updated_at = ?
        WHERE id = ?
        ",
    )
    .bind(&fields.name)
    .bind(&fields.description)
    .bind(brand_id)
    .bind(category_id)
    .bind(format_money(fields.list_price))
    .bind(fields.promo_price.map(format_money))
    .bind(fields.on_sale)
    .bind(fields.discount_percentage)
    .bind(fields.in_stock)
    .bind(&fields.image_url)
    .bind(&fields.product_url)
    .bind(labels_json(&fields.labels)?)
    .bind(format_timestamp(Utc::now()))
    .bind(product_id)
    .execute(&mut *conn)
    .await?;

    if done.rows_affected() == 0 {
        return Err(CatalogError::not_found("product", product_id.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CreateOutcome {
    Created,
    /// The SKU was inserted by someone else first; the draft was applied as an update
    Updated,
}

async fn apply_create(
    conn: &mut SqliteConnection,
    refs: &mut ReferenceIds,
    create: &PlannedCreate,
) -> CatalogResult<CreateOutcome> {
    let draft = &create.draft;
    let fields = &draft.fields;
    let (brand_id, category_id) = refs.for_fields(conn, fields).await?;
    let now = format_timestamp(Utc::now());

    let inserted = sqlx::query(
        r"
        INSERT INTO productos (
            nombre, descripcion, sku, marca_id, categoria_id,
            precio_compra, precio_venta, precio_oferta, en_oferta, porcentaje_descuento,
            stock, stock_minimo, en_stock, imagen_url, product_url, labels,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(&fields.name)
    .bind(&fields.description)
    .bind(&draft.sku)
    .bind(brand_id)
    .bind(category_id)
    .bind(format_money(draft.purchase_price))
    .bind(format_money(fields.list_price))
    .bind(fields.promo_price.map(format_money))
    .bind(fields.on_sale)
    .bind(fields.discount_percentage)
    .bind(draft.stock)
    .bind(draft.min_stock)
    .bind(fields.in_stock)
    .bind(&fields.image_url)
    .bind(&fields.product_url)
    .bind(labels_json(&fields.labels)?)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await;

    let (product_id, outcome) = match inserted {
        Ok(done) => (done.last_insert_rowid(), CreateOutcome::Created),
        Err(e) if is_unique_violation(&e) => {
            let sku = draft.sku.as_deref().unwrap_or_default();
            warn!("⚠️ SKU {} already stored, applying as update", sku);
            let existing = fetch_product_id_by_sku(conn, sku)
                .await?
                .ok_or_else(|| CatalogError::PersistenceConflict {
                    entity: "product".to_string(),
                    key: create.key.clone(),
                })?;
            update_catalog_fields(conn, existing, fields, brand_id, category_id).await?;
            (existing, CreateOutcome::Updated)
        }
        Err(e) => return Err(e.into()),
    };

    insert_notification(conn, create.notification.kind, &create.notification.message, Some(product_id)).await?;
    Ok(outcome)
}

/// Returns whether a notification was written
async fn apply_update(conn: &mut SqliteConnection, refs: &mut ReferenceIds, update: &PlannedUpdate) -> CatalogResult<bool> {
    let (brand_id, category_id) = refs.for_fields(conn, &update.fields).await?;
    update_catalog_fields(conn, update.product_id, &update.fields, brand_id, category_id).await?;

    match &update.notification {
        Some(notification) => {
            insert_notification(conn, notification.kind, &notification.message, Some(update.product_id)).await?;
            Ok(true)
        }
        None => Ok(false),
    }
}

fn record_create(report: &mut ApplyReport, outcome: CreateOutcome) {
    match outcome {
        CreateOutcome::Created => report.created += 1,
        CreateOutcome::Updated => report.updated += 1,
    }
    report.notified += 1;
}

#[derive(Clone)]
pub struct SqliteCatalogRepository {
    pool: Arc<SqlitePool>,
}

impl SqliteCatalogRepository {
    pub const fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    // ===============================
    // WRITE PLAN APPLICATION
    // ===============================

    async fn apply_full(&self, plan: &WritePlan) -> CatalogResult<ApplyReport> {
        let mut tx = self.pool.begin().await?;
        let mut refs = ReferenceIds::resolve(&mut tx, plan).await?;
        let mut report = ApplyReport::default();

        for create in &plan.creates {
            let outcome = apply_create(&mut tx, &mut refs, create).await?;
            record_create(&mut report, outcome);
        }
        for update in &plan.updates {
            if apply_update(&mut tx, &mut refs, update).await? {
                report.notified += 1;
            }
            report.updated += 1;
        }

        tx.commit().await?;
        Ok(report)
    }

    async fn apply_incremental(&self, plan: &WritePlan) -> CatalogResult<ApplyReport> {
        let mut refs = {
            let mut conn = self.pool.acquire().await?;
            ReferenceIds::resolve(&mut conn, plan).await?
        };
        let mut report = ApplyReport::default();

        for create in &plan.creates {
            let mut tx = self.pool.begin().await?;
            match apply_create(&mut tx, &mut refs, create).await {
                Ok(outcome) => {
                    tx.commit().await?;
                    record_create(&mut report, outcome);
                }
                Err(e) => {
                    tx.rollback().await?;
                    warn!("⚠️ Create of {} rolled back: {}", create.key, e);
                    report.failures.push(ItemFailure::new(&create.key, &create.draft.fields.name, &e));
                }
            }
        }

        for update in &plan.updates {
            let mut tx = self.pool.begin().await?;
            match apply_update(&mut tx, &mut refs, update).await {
                Ok(notified) => {
                    tx.commit().await?;
                    report.updated += 1;
                    if notified {
                        report.notified += 1;
                    }
                }
                Err(e) => {
                    tx.rollback().await?;
                    warn!("⚠️ Update of {} rolled back: {}", update.key, e);
                    report.failures.push(ItemFailure::new(&update.key, &update.fields.name, &e));
                }
            }
        }

        Ok(report)
    }
}

#[async_trait]
impl CatalogRepository for SqliteCatalogRepository {
    async fn load_snapshot(&self) -> CatalogResult<CatalogSnapshot> {
        let rows = sqlx::query(PRODUCT_SELECT).fetch_all(&*self.pool).await?;
        let products = rows.iter().map(product_from_row).collect::<CatalogResult<Vec<_>>>()?;
        debug!("Loaded catalog snapshot with {} products", products.len());
        Ok(CatalogSnapshot::new(products))
    }

    async fn apply_write_plan(&self, plan: &WritePlan, mode: SyncMode) -> CatalogResult<ApplyReport> {
        if plan.is_empty() {
            debug!("Write plan is empty, nothing to apply");
            return Ok(ApplyReport::default());
        }

        info!(
            "💾 Applying {} creates and {} updates ({} mode)",
            plan.creates.len(),
            plan.updates.len(),
            mode
        );
        let report = match mode {
            SyncMode::Full => self.apply_full(plan).await.map_err(|e| {
                warn!("❌ Full sync write rolled back: {}", e);
                match e {
                    CatalogError::StorageUnavailable(_) => e,
                    other => CatalogError::StorageUnavailable(format!("full sync rolled back: {}", other)),
                }
            })?,
            SyncMode::Incremental => self.apply_incremental(plan).await?,
        };

        info!(
            "✅ Applied: {} created, {} updated, {} notifications, {} failures",
            report.created,
            report.updated,
            report.notified,
            report.failures.len()
        );
        Ok(report)
    }

    async fn find_product(&self, product_id: i64) -> CatalogResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch_product(&mut conn, product_id).await
    }

    async fn find_product_by_sku(&self, sku: &str) -> CatalogResult<Option<Product>> {
        let query = format!("{} WHERE p.sku = ?", PRODUCT_SELECT);
        sqlx::query(&query)
            .bind(sku)
            .fetch_optional(&*self.pool)
            .await?
            .as_ref()
            .map(product_from_row)
            .transpose()
    }

    async fn low_stock_products(&self) -> CatalogResult<Vec<Product>> {
        let query = format!("{} WHERE p.stock <= p.stock_minimo ORDER BY p.stock ASC, p.id ASC", PRODUCT_SELECT);
        let rows = sqlx::query(&query).fetch_all(&*self.pool).await?;
        rows.iter().map(product_from_row).collect()
    }

    async fn count_products(&self) -> CatalogResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM productos")
            .fetch_one(&*self.pool)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::notification::PlannedNotification;
    use crate::domain::product::ProductDraft;
    use crate::infrastructure::database_connection::DatabaseConnection;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    async fn repository() -> (SqliteCatalogRepository, Arc<SqlitePool>, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("catalog.db").display());
        let db = DatabaseConnection::new(&url, 2, 5).await.unwrap();
        db.migrate().await.unwrap();
        let pool = Arc::new(db.pool().clone());
        (SqliteCatalogRepository::new(pool.clone()), pool, dir)
    }

    fn fields(name: &str, price: i64) -> CatalogFields {
        CatalogFields {
            name: name.to_string(),
            description: None,
            brand: "Saphirus".to_string(),
            category: "Aromatizantes".to_string(),
            list_price: Decimal::from(price),
            promo_price: None,
            on_sale: false,
            discount_percentage: None,
            in_stock: true,
            image_url: None,
            product_url: None,
            labels: vec!["Nuevo".to_string()],
        }
    }

    fn create(sku: &str, name: &str, price: i64) -> PlannedCreate {
        PlannedCreate {
            key: format!("sku:{sku}"),
            draft: ProductDraft {
                sku: Some(sku.to_string()),
                fields: fields(name, price),
                purchase_price: Decimal::from(price) * Decimal::new(70, 2),
                stock: 0,
                min_stock: 3,
            },
            notification: PlannedNotification::new_product(name, Decimal::from(price)),
        }
    }

    fn plan(creates: Vec<PlannedCreate>, updates: Vec<PlannedUpdate>) -> WritePlan {
        let mut plan = WritePlan::default();
        for c in &creates {
            plan.brands.insert(c.draft.fields.brand.clone());
            plan.categories.insert(c.draft.fields.category.clone());
        }
        for u in &updates {
            plan.brands.insert(u.fields.brand.clone());
            plan.categories.insert(u.fields.category.clone());
        }
        plan.creates = creates;
        plan.updates = updates;
        plan
    }

    async fn notification_count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM notificaciones").fetch_one(pool).await.unwrap()
    }

    #[tokio::test]
    async fn creates_products_with_references_and_notifications() {
        let (repo, pool, _dir) = repository().await;
        let report = repo
            .apply_write_plan(&plan(vec![create("A-1", "Aroma", 10_000), create("B-2", "Vela", 5_000)], vec![]), SyncMode::Full)
            .await
            .unwrap();

        assert_eq!((report.created, report.updated, report.notified), (2, 0, 2));
        assert_eq!(notification_count(&pool).await, 2);

        let stored = repo.find_product_by_sku("A-1").await.unwrap().unwrap();
        assert_eq!(stored.brand_name, "Saphirus");
        assert_eq!(stored.category_name, "Aromatizantes");
        assert_eq!(stored.list_price, Decimal::from(10_000));
        assert_eq!(stored.purchase_price, Decimal::from(7_000));
        assert_eq!(stored.labels, vec!["Nuevo".to_string()]);
        assert_eq!(stored.stock, 0);

        let brands: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM marcas").fetch_one(&*pool).await.unwrap();
        assert_eq!(brands, 1);
        assert_eq!(repo.load_snapshot().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn ensure_named_is_idempotent() {
        let (_repo, pool, _dir) = repository().await;
        let mut conn = pool.acquire().await.unwrap();
        let first = ensure_named(&mut conn, NamedTable::Brands, "Ambar").await.unwrap();
        let second = ensure_named(&mut conn, NamedTable::Brands, "Ambar").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn racing_brand_inserts_resolve_to_one_row() {
        let (_repo, pool, _dir) = repository().await;
        let mut tx = pool.begin().await.unwrap();
        let mut other = pool.acquire().await.unwrap();

        // the first writer holds its uncommitted row while the second one misses it
        let first = ensure_named(&mut tx, NamedTable::Brands, "Ambar").await.unwrap();
        let (second, ()) = tokio::join!(ensure_named(&mut other, NamedTable::Brands, "Ambar"), async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            tx.commit().await.unwrap();
        });

        assert_eq!(second.unwrap(), first);
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM marcas WHERE nombre = 'Ambar'")
            .fetch_one(&*pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn sku_conflict_turns_create_into_update() {
        let (repo, _pool, _dir) = repository().await;
        repo.apply_write_plan(&plan(vec![create("A-1", "Aroma", 10_000)], vec![]), SyncMode::Full)
            .await
            .unwrap();

        let report = repo
            .apply_write_plan(&plan(vec![create("A-1", "Aroma Nuevo", 12_000)], vec![]), SyncMode::Full)
            .await
            .unwrap();
        assert_eq!((report.created, report.updated), (0, 1));

        let stored = repo.find_product_by_sku("A-1").await.unwrap().unwrap();
        assert_eq!(stored.name, "Aroma Nuevo");
        assert_eq!(stored.list_price, Decimal::from(12_000));
        assert_eq!(repo.count_products().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn full_mode_rolls_back_everything_on_failure() {
        let (repo, pool, _dir) = repository().await;
        let missing = PlannedUpdate {
            product_id: 999,
            key: "sku:GONE".to_string(),
            fields: fields("Gone", 1_000),
            notification: None,
        };

        let err = repo
            .apply_write_plan(&plan(vec![create("A-1", "Aroma", 10_000)], vec![missing]), SyncMode::Full)
            .await
            .unwrap_err();
        assert!(err.is_run_level());
        assert_eq!(repo.count_products().await.unwrap(), 0);
        assert_eq!(notification_count(&pool).await, 0);
    }

    #[tokio::test]
    async fn incremental_mode_isolates_failing_products() {
        let (repo, pool, _dir) = repository().await;
        let missing = PlannedUpdate {
            product_id: 999,
            key: "sku:GONE".to_string(),
            fields: fields("Gone", 1_000),
            notification: Some(PlannedNotification::price_change("Gone", Decimal::ONE, Decimal::TWO)),
        };

        let report = repo
            .apply_write_plan(
                &plan(vec![create("A-1", "Aroma", 10_000)], vec![missing]),
                SyncMode::Incremental,
            )
            .await
            .unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.updated, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].key, "sku:GONE");
        assert_eq!(report.failures[0].kind, "not_found");
        assert_eq!(notification_count(&pool).await, 1);
    }

    #[tokio::test]
    async fn update_rewrites_catalog_fields_in_place() {
        let (repo, _pool, _dir) = repository().await;
        repo.apply_write_plan(&plan(vec![create("A-1", "Aroma", 10_000)], vec![]), SyncMode::Full)
            .await
            .unwrap();
        let stored = repo.find_product_by_sku("A-1").await.unwrap().unwrap();

        let mut changed = fields("Aroma", 10_000);
        changed.promo_price = Some(Decimal::from(8_000));
        changed.on_sale = true;
        changed.discount_percentage = Some(20);
        changed.category = "Difusores".to_string();
        let update = PlannedUpdate {
            product_id: stored.id,
            key: "sku:A-1".to_string(),
            fields: changed,
            notification: Some(PlannedNotification::price_change("Aroma", Decimal::from(10_000), Decimal::from(8_000))),
        };
        let report = repo.apply_write_plan(&plan(vec![], vec![update]), SyncMode::Incremental).await.unwrap();
        assert_eq!((report.updated, report.notified), (1, 1));

        let stored = repo.find_product(stored.id).await.unwrap().unwrap();
        assert_eq!(stored.promo_price, Some(Decimal::from(8_000)));
        assert_eq!(stored.discount_percentage, Some(20));
        assert_eq!(stored.category_name, "Difusores");
        assert_eq!(stored.purchase_price, Decimal::from(7_000));
    }

    #[tokio::test]
    async fn low_stock_products_are_sorted_by_stock() {
        let (repo, pool, _dir) = repository().await;
        repo.apply_write_plan(
            &plan(vec![create("A-1", "Aroma", 100), create("B-2", "Vela", 100), create("C-3", "Spray", 100)], vec![]),
            SyncMode::Full,
        )
        .await
        .unwrap();
        sqlx::query("UPDATE productos SET stock = 2 WHERE sku = 'A-1'").execute(&*pool).await.unwrap();
        sqlx::query("UPDATE productos SET stock = 10 WHERE sku = 'C-3'").execute(&*pool).await.unwrap();

        let low = repo.low_stock_products().await.unwrap();
        let skus: Vec<_> = low.iter().filter_map(|p| p.sku.as_deref()).collect();
        assert_eq!(skus, vec!["B-2", "A-1"]);
    }
}
