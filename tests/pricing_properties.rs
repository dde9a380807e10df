//! Property tests for storefront price handling

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use rust_decimal::Decimal;

use fragrance_stock_lib::domain::PriceLocale;
use fragrance_stock_lib::domain::value_objects::{discount_percentage, round_money, sale_margin};

/// Renders `value` the way the storefront does: `$12.345.678`
fn storefront_amount(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::new();
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }
    format!("${grouped}")
}

proptest! {
    #[test]
    fn grouped_amounts_parse_to_their_value(value in 0u64..10_000_000_000) {
        let parser = PriceLocale::default().parser().unwrap();
        prop_assert_eq!(parser.parse(&storefront_amount(value)).unwrap(), Decimal::from(value));
    }

    #[test]
    fn cents_after_the_decimal_comma_are_kept(units in 0u64..1_000_000, cents in 0u32..100) {
        let parser = PriceLocale::default().parser().unwrap();
        let raw = format!("{},{:02}", storefront_amount(units), cents);
        let expected = Decimal::from(units) + Decimal::new(i64::from(cents), 2);
        prop_assert_eq!(parser.parse(&raw).unwrap(), expected);
    }

    #[test]
    fn discount_stays_within_percentage_bounds(regular in 1i64..10_000_000, sale in -1_000i64..20_000_000) {
        let pct = discount_percentage(Decimal::from(regular), Decimal::from(sale)).unwrap();
        prop_assert!((0..=100).contains(&pct));
    }

    #[test]
    fn margin_is_linear_in_quantity(sale in 0i64..1_000_000, cost in 0i64..1_000_000, qty in 1i64..1_000) {
        let unit = sale_margin(Decimal::new(sale, 2), Decimal::new(cost, 2), 1).unwrap();
        let total = sale_margin(Decimal::new(sale, 2), Decimal::new(cost, 2), qty).unwrap();
        prop_assert_eq!(total, round_money(unit * Decimal::from(qty)));
    }
}

#[test]
fn zero_regular_price_has_no_discount() {
    assert_eq!(discount_percentage(Decimal::ZERO, Decimal::from(10)), None);
}
