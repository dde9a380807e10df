//! Stock movements and the sale/purchase ledger

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::{CatalogError, CatalogResult};
use super::value_objects::{MAX_UNIT_PRICE, max_unit_price};

/// Direction of a stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Sale,
    Purchase,
}

impl TransactionKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sale => "SALE",
            Self::Purchase => "PURCHASE",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SALE" => Ok(Self::Sale),
            "PURCHASE" => Ok(Self::Purchase),
            other => Err(CatalogError::parse(
                "transaction_kind",
                format!("unknown kind '{other}'"),
            )),
        }
    }
}

/// A recorded sale or purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub kind: TransactionKind,
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub total: Decimal,
    /// Only recorded for sales
    pub margin: Option<Decimal>,
    pub date: DateTime<Utc>,
    pub user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRequest {
    pub product_id: i64,
    pub quantity: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub user_id: i64,
}

/// Aggregated sales over a period
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsSummary {
    pub total_margin: Decimal,
    pub total_sales: Decimal,
    pub transaction_count: i64,
}

/// Largest quantity a single ledger entry may move
pub const MAX_QUANTITY: i64 = 1_000_000;

/// Quantities must be whole positive units
pub fn validate_quantity(quantity: i64) -> CatalogResult<()> {
    if quantity < 1 {
        return Err(CatalogError::Validation(format!(
            "quantity must be at least 1, got {quantity}"
        )));
    }
    if quantity > MAX_QUANTITY {
        return Err(CatalogError::Validation(format!(
            "quantity must be at most {MAX_QUANTITY}, got {quantity}"
        )));
    }
    Ok(())
}

impl SaleRequest {
    pub fn validate(&self) -> CatalogResult<()> {
        validate_quantity(self.quantity)
    }
}

impl PurchaseRequest {
    pub fn validate(&self) -> CatalogResult<()> {
        validate_quantity(self.quantity)?;
        if self.unit_price <= Decimal::ZERO || self.unit_price > max_unit_price() {
            return Err(CatalogError::Validation(format!(
                "unit price must be positive and at most {}, got {}",
                MAX_UNIT_PRICE, self.unit_price
            )));
        }
        Ok(())
    }
}
