// Database connection and pool management
// This module handles SQLite database connections using sqlx

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::domain::errors::{CatalogError, CatalogResult};

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    pub async fn new(database_url: &str, max_connections: u32, busy_timeout_seconds: u64) -> Result<Self> {
        let db_path = database_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");
        let db_path = db_path.split('?').next().unwrap_or(db_path);

        if !db_path.is_empty() && db_path != ":memory:" {
            if let Some(parent) = Path::new(db_path).parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create database directory {:?}", parent))?;
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL '{}'", database_url))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(busy_timeout_seconds));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database '{}'", database_url))?;

        info!("🗄️ Database connected: {}", database_url);
        Ok(Self { pool })
    }

    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the schema when missing
    pub async fn migrate(&self) -> Result<()> {
        let statements = [
            r"
            CREATE TABLE IF NOT EXISTS marcas (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                nombre TEXT NOT NULL UNIQUE,
                descripcion TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS categorias (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                nombre TEXT NOT NULL UNIQUE,
                descripcion TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS productos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                nombre TEXT NOT NULL,
                descripcion TEXT,
                sku TEXT UNIQUE,
                marca_id INTEGER REFERENCES marcas (id),
                categoria_id INTEGER REFERENCES categorias (id),
                precio_compra TEXT NOT NULL DEFAULT '0.00',
                precio_venta TEXT NOT NULL DEFAULT '0.00',
                precio_oferta TEXT,
                en_oferta INTEGER NOT NULL DEFAULT 0,
                porcentaje_descuento INTEGER
                    CHECK (porcentaje_descuento IS NULL OR porcentaje_descuento BETWEEN 0 AND 100),
                stock INTEGER NOT NULL DEFAULT 0 CHECK (stock >= 0),
                stock_minimo INTEGER NOT NULL DEFAULT 3,
                en_stock INTEGER NOT NULL DEFAULT 1,
                imagen_url TEXT,
                product_url TEXT,
                labels TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS transacciones (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tipo TEXT NOT NULL CHECK (tipo IN ('SALE', 'PURCHASE')),
                producto_id INTEGER NOT NULL REFERENCES productos (id),
                cantidad INTEGER NOT NULL CHECK (cantidad >= 1),
                precio_unitario TEXT NOT NULL,
                total TEXT NOT NULL,
                ganancia TEXT,
                fecha TEXT NOT NULL,
                usuario_id INTEGER
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS productos_pedido (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pedido_id INTEGER NOT NULL,
                producto_id INTEGER NOT NULL REFERENCES productos (id),
                cantidad INTEGER NOT NULL CHECK (cantidad >= 1),
                precio_unitario TEXT NOT NULL
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS notificaciones (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tipo TEXT NOT NULL CHECK (tipo IN ('LOW_STOCK', 'NEW_SALE', 'NEW_PRODUCT', 'PRICE_CHANGE')),
                mensaje TEXT NOT NULL,
                leida INTEGER NOT NULL DEFAULT 0,
                producto_id INTEGER REFERENCES productos (id) ON DELETE SET NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_productos_nombre ON productos (nombre)",
            "CREATE INDEX IF NOT EXISTS idx_productos_stock ON productos (stock)",
            "CREATE INDEX IF NOT EXISTS idx_transacciones_fecha ON transacciones (tipo, fecha)",
            "CREATE INDEX IF NOT EXISTS idx_transacciones_producto ON transacciones (producto_id)",
            "CREATE INDEX IF NOT EXISTS idx_notificaciones_leida ON notificaciones (leida)",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to create database schema")?;
        }

        debug!("Schema ready");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Fixed-width UTC timestamp so stored values sort lexically
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> CatalogResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| CatalogError::parse("timestamp", format!("'{}': {}", raw, e)))
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::PersistenceConflict {
                entity: db.table().unwrap_or("record").to_string(),
                key: db.message().to_string(),
            },
            sqlx::Error::RowNotFound => Self::NotFound {
                entity: "row",
                key: String::new(),
            },
            _ => Self::StorageUnavailable(err.to_string()),
        }
    }
}
