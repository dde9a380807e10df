//! Inventory notifications raised by sync runs and stock movements

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::CatalogError;
use super::value_objects::format_money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    LowStock,
    NewSale,
    NewProduct,
    PriceChange,
}

impl NotificationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LowStock => "LOW_STOCK",
            Self::NewSale => "NEW_SALE",
            Self::NewProduct => "NEW_PRODUCT",
            Self::PriceChange => "PRICE_CHANGE",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW_STOCK" => Ok(Self::LowStock),
            "NEW_SALE" => Ok(Self::NewSale),
            "NEW_PRODUCT" => Ok(Self::NewProduct),
            "PRICE_CHANGE" => Ok(Self::PriceChange),
            other => Err(CatalogError::parse(
                "notification_kind",
                format!("unknown kind '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub kind: NotificationKind,
    pub message: String,
    pub read: bool,
    pub product_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A notification that will be inserted together with the write it describes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedNotification {
    pub kind: NotificationKind,
    pub message: String,
}

impl PlannedNotification {
    pub fn new_product(name: &str, list_price: Decimal) -> Self {
        Self {
            kind: NotificationKind::NewProduct,
            message: format!(
                "New product found: {} - Price: ${}",
                name,
                format_money(list_price)
            ),
        }
    }

    pub fn price_change(name: &str, old_price: Decimal, new_price: Decimal) -> Self {
        Self {
            kind: NotificationKind::PriceChange,
            message: format!(
                "Price change on {}: ${} -> ${}",
                name,
                format_money(old_price),
                format_money(new_price)
            ),
        }
    }

    pub fn low_stock(name: &str, stock: i64, min_stock: i64) -> Self {
        Self {
            kind: NotificationKind::LowStock,
            message: format!("Low stock for {name}: {stock} left (minimum {min_stock})"),
        }
    }
}
