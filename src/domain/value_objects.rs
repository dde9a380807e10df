//! # Domain Value Objects
//!
//! Money handling for the catalog: locale-aware price parsing, rounding,
//! discount and margin arithmetic. All amounts are [`Decimal`] values rounded
//! to two decimal places before they are compared or stored.

#![allow(clippy::uninlined_format_args)]

use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::errors::{CatalogError, CatalogResult};

/// Rounds an amount to cents, half away from zero
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Formats an amount with exactly two decimals (`10000.00`)
pub fn format_money(amount: Decimal) -> String {
    format!("{:.2}", round_money(amount))
}

/// Parses a stored amount back into a [`Decimal`]
pub fn parse_stored_money(raw: &str) -> CatalogResult<Decimal> {
    Decimal::from_str(raw.trim())
        .map(round_money)
        .map_err(|e| CatalogError::parse("stored_amount", format!("'{}': {}", raw, e)))
}

/// Discount percentage of `sale` relative to `regular`.
///
/// Rounded half away from zero and clamped to `0..=100`. Returns `None` when
/// the regular price is zero or negative.
pub fn discount_percentage(regular: Decimal, sale: Decimal) -> Option<i32> {
    if regular <= Decimal::ZERO {
        return None;
    }
    let pct = ((regular - sale) / regular * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
    pct.to_i32()
}

/// Largest unit price accepted from the storefront or a ledger request
pub const MAX_UNIT_PRICE: i64 = 1_000_000_000_000;

pub fn max_unit_price() -> Decimal {
    Decimal::from(MAX_UNIT_PRICE)
}

/// `unit_price * quantity` rounded to cents; overflow is a validation error
pub fn line_total(unit_price: Decimal, quantity: i64) -> CatalogResult<Decimal> {
    unit_price
        .checked_mul(Decimal::from(quantity))
        .map(round_money)
        .ok_or_else(|| {
            CatalogError::Validation(format!(
                "amount {} x {} is out of range",
                unit_price, quantity
            ))
        })
}

/// Margin of a sale: `unit_sale_price * qty - unit_purchase_price * qty`
pub fn sale_margin(unit_sale_price: Decimal, unit_purchase_price: Decimal, quantity: i64) -> CatalogResult<Decimal> {
    let revenue = line_total(unit_sale_price, quantity)?;
    let cost = line_total(unit_purchase_price, quantity)?;
    revenue
        .checked_sub(cost)
        .map(round_money)
        .ok_or_else(|| CatalogError::Validation(format!("margin {} - {} is out of range", revenue, cost)))
}

/// Estimated acquisition cost for a product first seen on the storefront
pub fn estimated_purchase_price(list_price: Decimal, ratio: Decimal) -> Decimal {
    round_money(list_price.saturating_mul(ratio))
}

/// Storefront price formatting conventions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLocale {
    /// Currency symbol printed next to amounts
    pub currency_symbol: String,
    pub thousands_separator: char,
    pub decimal_separator: char,
}

impl Default for PriceLocale {
    /// Argentine peso formatting: `$10.000,50`
    fn default() -> Self {
        Self {
            currency_symbol: "$".to_string(),
            thousands_separator: '.',
            decimal_separator: ',',
        }
    }
}

impl PriceLocale {
    /// Compiles the validation patterns for this locale
    pub fn parser(&self) -> CatalogResult<PriceParser> {
        if self.thousands_separator == self.decimal_separator {
            return Err(CatalogError::Configuration(format!(
                "thousands and decimal separators must differ (both '{}')",
                self.thousands_separator
            )));
        }

        let thousands = regex::escape(&self.thousands_separator.to_string());
        let decimal = regex::escape(&self.decimal_separator.to_string());
        let pattern = format!(
            r"^(?:\d{{1,3}}(?:{t}\d{{3}})+|\d+)(?:{d}\d+)?$",
            t = thousands,
            d = decimal
        );
        let pattern = Regex::new(&pattern)
            .map_err(|e| CatalogError::Configuration(format!("invalid price pattern: {}", e)))?;

        Ok(PriceParser {
            locale: self.clone(),
            pattern,
        })
    }
}

/// Validating price parser bound to one [`PriceLocale`]
#[derive(Debug, Clone)]
pub struct PriceParser {
    locale: PriceLocale,
    pattern: Regex,
}

impl PriceParser {
    pub const fn locale(&self) -> &PriceLocale {
        &self.locale
    }

    /// Parses storefront price text such as `"$ 10.000"` into a [`Decimal`].
    ///
    /// The currency symbol and any whitespace are ignored. Thousands groups
    /// must be well formed, so `"$1.5"` is rejected under the default locale
    /// rather than read as fifteen.
    pub fn parse(&self, raw: &str) -> CatalogResult<Decimal> {
        let compact: String = raw
            .replace(self.locale.currency_symbol.as_str(), "")
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        if compact.is_empty() {
            return Err(CatalogError::parse("price", format!("no amount in '{}'", raw.trim())));
        }

        if !self.pattern.is_match(&compact) {
            return Err(CatalogError::parse(
                "price",
                format!("'{}' is not a valid amount", raw.trim()),
            ));
        }

        let normalized: String = compact
            .chars()
            .filter(|c| *c != self.locale.thousands_separator)
            .map(|c| if c == self.locale.decimal_separator { '.' } else { c })
            .collect();

        let amount = Decimal::from_str(&normalized)
            .map(round_money)
            .map_err(|e| CatalogError::parse("price", format!("'{}': {}", raw.trim(), e)))?;
        if amount > max_unit_price() {
            return Err(CatalogError::parse(
                "price",
                format!("'{}' exceeds the largest accepted price", raw.trim()),
            ));
        }
        Ok(amount)
    }
}
