//! Stock movements and the sale/purchase ledger on SQLite
//!
//! Stock is only ever changed by a conditional `UPDATE`, so a sale can never
//! drive it below zero even when two requests race for the last units.

#![allow(clippy::uninlined_format_args)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::errors::{CatalogError, CatalogResult};
use crate::domain::notification::PlannedNotification;
use crate::domain::product::Product;
use crate::domain::repositories::InventoryRepository;
use crate::domain::transaction::{
    EarningsSummary, PurchaseRequest, SaleRequest, Transaction, TransactionKind, validate_quantity,
};
use crate::domain::value_objects::{format_money, line_total, parse_stored_money, round_money, sale_margin};
use crate::infrastructure::catalog_repository::fetch_product;
use crate::infrastructure::database_connection::{format_timestamp, parse_timestamp};
use crate::infrastructure::notification_repository::insert_notification;

async fn require_product(conn: &mut SqliteConnection, product_id: i64) -> CatalogResult<Product> {
    fetch_product(conn, product_id)
        .await?
        .ok_or_else(|| CatalogError::not_found("product", product_id))
}

/// Applies one stock movement and raises LOW_STOCK after a sale that lands at or below the minimum
async fn move_stock(
    conn: &mut SqliteConnection,
    product_id: i64,
    quantity: i64,
    kind: TransactionKind,
) -> CatalogResult<Product> {
    validate_quantity(quantity)?;
    let now = format_timestamp(Utc::now());

    let done = match kind {
        TransactionKind::Sale => {
            sqlx::query("UPDATE productos SET stock = stock - ?, updated_at = ? WHERE id = ? AND stock >= ?")
                .bind(quantity)
                .bind(&now)
                .bind(product_id)
                .bind(quantity)
                .execute(&mut *conn)
                .await?
        }
        TransactionKind::Purchase => {
            sqlx::query("UPDATE productos SET stock = stock + ?, updated_at = ? WHERE id = ?")
                .bind(quantity)
                .bind(&now)
                .bind(product_id)
                .execute(&mut *conn)
                .await?
        }
    };

    if done.rows_affected() == 0 {
        let product = require_product(conn, product_id).await?;
        warn!(
            "⚠️ Rejected sale of {} units of {}: only {} in stock",
            quantity, product.name, product.stock
        );
        return Err(CatalogError::InsufficientStock {
            product_id,
            requested: quantity,
            available: product.stock,
        });
    }

    let product = require_product(conn, product_id).await?;
    if kind == TransactionKind::Sale && product.is_low_stock() {
        let notification = PlannedNotification::low_stock(&product.name, product.stock, product.min_stock);
        insert_notification(conn, notification.kind, &notification.message, Some(product_id)).await?;
    }
    debug!("Stock of {} is now {}", product.name, product.stock);
    Ok(product)
}

async fn insert_transaction(
    conn: &mut SqliteConnection,
    kind: TransactionKind,
    product_id: i64,
    quantity: i64,
    unit_price: Decimal,
    total: Decimal,
    margin: Option<Decimal>,
    user_id: i64,
) -> CatalogResult<Transaction> {
    let date = Utc::now();
    let done = sqlx::query(
        r"
        INSERT INTO transacciones (tipo, producto_id, cantidad, precio_unitario, total, ganancia, fecha, usuario_id)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(kind.as_str())
    .bind(product_id)
    .bind(quantity)
    .bind(format_money(unit_price))
    .bind(format_money(total))
    .bind(margin.map(format_money))
    .bind(format_timestamp(date))
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    Ok(Transaction {
        id: done.last_insert_rowid(),
        kind,
        product_id,
        quantity,
        unit_price: round_money(unit_price),
        total: round_money(total),
        margin: margin.map(round_money),
        date: parse_timestamp(&format_timestamp(date))?,
        user_id,
    })
}

#[derive(Clone)]
pub struct SqliteInventoryRepository {
    pool: Arc<SqlitePool>,
}

impl SqliteInventoryRepository {
    pub const fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InventoryRepository for SqliteInventoryRepository {
    async fn adjust_stock(&self, product_id: i64, quantity: i64, kind: TransactionKind) -> CatalogResult<Product> {
        let mut tx = self.pool.begin().await?;
        let product = move_stock(&mut tx, product_id, quantity, kind).await?;
        tx.commit().await?;
        Ok(product)
    }

    async fn register_sale(&self, request: &SaleRequest) -> CatalogResult<Transaction> {
        request.validate()?;
        let mut tx = self.pool.begin().await?;

        // writing first takes the write lock before anything is read
        let product = move_stock(&mut tx, request.product_id, request.quantity, TransactionKind::Sale).await?;
        let total = line_total(product.list_price, request.quantity)?;
        let margin = sale_margin(product.list_price, product.purchase_price, request.quantity)?;
        let transaction = insert_transaction(
            &mut tx,
            TransactionKind::Sale,
            product.id,
            request.quantity,
            product.list_price,
            total,
            Some(margin),
            request.user_id,
        )
        .await?;
        tx.commit().await?;

        info!(
            "💰 Sale of {} x {} for ${} (margin ${})",
            request.quantity,
            product.name,
            format_money(total),
            format_money(margin)
        );
        Ok(transaction)
    }

    async fn register_purchase(&self, request: &PurchaseRequest) -> CatalogResult<Transaction> {
        request.validate()?;
        let mut tx = self.pool.begin().await?;

        let product = move_stock(&mut tx, request.product_id, request.quantity, TransactionKind::Purchase).await?;
        sqlx::query("UPDATE productos SET precio_compra = ? WHERE id = ?")
            .bind(format_money(request.unit_price))
            .bind(product.id)
            .execute(&mut *tx)
            .await?;
        let total = line_total(request.unit_price, request.quantity)?;
        let transaction = insert_transaction(
            &mut tx,
            TransactionKind::Purchase,
            product.id,
            request.quantity,
            request.unit_price,
            total,
            None,
            request.user_id,
        )
        .await?;
        tx.commit().await?;

        info!(
            "📥 Purchase of {} x {} at ${}",
            request.quantity,
            product.name,
            format_money(request.unit_price)
        );
        Ok(transaction)
    }

    async fn earnings(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> CatalogResult<EarningsSummary> {
        let rows = sqlx::query("SELECT total, ganancia FROM transacciones WHERE tipo = 'SALE' AND fecha >= ? AND fecha <= ?")
            .bind(format_timestamp(from))
            .bind(format_timestamp(to))
            .fetch_all(&*self.pool)
            .await?;

        let mut summary = EarningsSummary {
            total_margin: Decimal::ZERO,
            total_sales: Decimal::ZERO,
            transaction_count: 0,
        };
        for row in &rows {
            let total: String = row.try_get("total")?;
            let margin: Option<String> = row.try_get("ganancia")?;
            summary.total_sales += parse_stored_money(&total)?;
            if let Some(margin) = margin {
                summary.total_margin += parse_stored_money(&margin)?;
            }
            summary.transaction_count += 1;
        }
        Ok(summary)
    }

    async fn count_transactions(&self, product_id: i64) -> CatalogResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM transacciones WHERE producto_id = ?")
            .bind(product_id)
            .fetch_one(&*self.pool)
            .await?)
    }
}
