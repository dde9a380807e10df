//! Domain error taxonomy
//!
//! Every failure that crosses a layer boundary is expressed as a
//! [`CatalogError`]. Run-level failures abort a sync; item-level failures are
//! recorded as [`ItemFailure`] entries in the sync summary and the run goes on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Network failure for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Parse failure on '{field}': {message}")]
    Parse { field: String, message: String },

    #[error("Reconciliation conflict for '{key}': {reason}")]
    ReconciliationConflict { key: String, reason: String },

    #[error("Persistence conflict on {entity} '{key}'")]
    PersistenceConflict { entity: String, key: String },

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: i64,
        requested: i64,
        available: i64,
    },

    #[error("{entity} '{key}' not found")]
    NotFound { entity: &'static str, key: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CatalogError {
    pub fn network(url: &str, message: impl Into<String>) -> Self {
        Self::Network {
            url: url.to_string(),
            message: message.into(),
        }
    }

    pub fn parse(field: &str, message: impl Into<String>) -> Self {
        Self::Parse {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Stable machine-readable name of the error kind
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network",
            Self::Parse { .. } => "parse",
            Self::ReconciliationConflict { .. } => "reconciliation_conflict",
            Self::PersistenceConflict { .. } => "persistence_conflict",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::NotFound { .. } => "not_found",
            Self::Validation(_) => "validation",
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Whether this failure should abort a whole sync run rather than a single item
    pub const fn is_run_level(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::StorageUnavailable(_) | Self::Configuration(_)
        )
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// A single product that could not be reconciled or persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    /// Reconciliation key (SKU or name) of the offending item
    pub key: String,
    pub name: String,
    pub kind: String,
    pub error: String,
}

impl ItemFailure {
    pub fn new(key: impl Into<String>, name: impl Into<String>, error: &CatalogError) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            kind: error.kind().to_string(),
            error: error.to_string(),
        }
    }
}
