//! SQLite storage for notifications

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::debug;

use crate::domain::errors::{CatalogError, CatalogResult};
use crate::domain::notification::{Notification, NotificationKind};
use crate::domain::repositories::NotificationRepository;
use crate::infrastructure::database_connection::{format_timestamp, parse_timestamp};

/// Inserts a notification on the caller's connection so it commits with the write it describes
pub(crate) async fn insert_notification(
    conn: &mut SqliteConnection,
    kind: NotificationKind,
    message: &str,
    product_id: Option<i64>,
) -> CatalogResult<i64> {
    let now = format_timestamp(Utc::now());
    let done = sqlx::query(
        "INSERT INTO notificaciones (tipo, mensaje, leida, producto_id, created_at, updated_at) VALUES (?, ?, 0, ?, ?, ?)",
    )
    .bind(kind.as_str())
    .bind(message)
    .bind(product_id)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;
    debug!("🔔 {} notification: {}", kind, message);
    Ok(done.last_insert_rowid())
}

fn notification_from_row(row: &SqliteRow) -> CatalogResult<Notification> {
    let kind: String = row.try_get("tipo")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    Ok(Notification {
        id: row.try_get("id")?,
        kind: kind.parse()?,
        message: row.try_get("mensaje")?,
        read: row.try_get("leida")?,
        product_id: row.try_get("producto_id")?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[derive(Clone)]
pub struct SqliteNotificationRepository {
    pool: Arc<SqlitePool>,
}

impl SqliteNotificationRepository {
    pub const fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for SqliteNotificationRepository {
    async fn unread(&self) -> CatalogResult<Vec<Notification>> {
        let rows = sqlx::query(
            "SELECT id, tipo, mensaje, leida, producto_id, created_at, updated_at
             FROM notificaciones WHERE leida = 0 ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&*self.pool)
        .await?;
        rows.iter().map(notification_from_row).collect()
    }

    async fn count_unread(&self) -> CatalogResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM notificaciones WHERE leida = 0")
            .fetch_one(&*self.pool)
            .await?)
    }

    async fn mark_read(&self, notification_id: i64) -> CatalogResult<()> {
        let done = sqlx::query("UPDATE notificaciones SET leida = 1, updated_at = ? WHERE id = ?")
            .bind(format_timestamp(Utc::now()))
            .bind(notification_id)
            .execute(&*self.pool)
            .await?;
        if done.rows_affected() == 0 {
            return Err(CatalogError::not_found("notification", notification_id));
        }
        Ok(())
    }

    async fn mark_all_read(&self) -> CatalogResult<u64> {
        let done = sqlx::query("UPDATE notificaciones SET leida = 1, updated_at = ? WHERE leida = 0")
            .bind(format_timestamp(Utc::now()))
            .execute(&*self.pool)
            .await?;
        Ok(done.rows_affected())
    }
}
