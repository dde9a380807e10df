//! Inventory use cases against a synced catalog

#![allow(clippy::unwrap_used)]

mod common;

use chrono::{Duration, Utc};
use futures::future::join_all;
use rust_decimal::Decimal;

use common::{TestEnv, test_env};
use fragrance_stock_lib::application::SyncTrigger;
use fragrance_stock_lib::domain::{CatalogError, NotificationKind, PurchaseRequest, SaleRequest, SyncMode};

async fn synced_env() -> TestEnv {
    let env = test_env().await;
    env.state
        .coordinator
        .trigger(SyncMode::Full, SyncTrigger::Manual)
        .await
        .unwrap();
    env
}

async fn product_id(env: &TestEnv, sku: &str) -> i64 {
    env.state.catalog.find_product_by_sku(sku).await.unwrap().unwrap().id
}

async fn restock(env: &TestEnv, product_id: i64, quantity: i64, unit_price: i64) {
    env.state
        .inventory
        .register_purchase(&PurchaseRequest {
            product_id,
            quantity,
            unit_price: Decimal::from(unit_price),
            user_id: 1,
        })
        .await
        .unwrap();
}

const fn sale(product_id: i64, quantity: i64) -> SaleRequest {
    SaleRequest {
        product_id,
        quantity,
        user_id: 1,
    }
}

#[tokio::test]
async fn concurrent_sales_never_oversell() {
    let env = synced_env().await;
    let id = product_id(&env, "SAP-COC-02").await;
    restock(&env, id, 5, 4_000).await;

    let inventory = env.state.inventory.clone();
    let attempts = (0..10).map(|_| {
        let inventory = inventory.clone();
        tokio::spawn(async move { inventory.register_sale(&sale(id, 1)).await })
    });
    let results: Vec<_> = join_all(attempts).await.into_iter().map(Result::unwrap).collect();

    let sold = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(CatalogError::InsufficientStock { .. })))
        .count();
    assert_eq!(sold, 5);
    assert_eq!(rejected, 5);

    let product = env.state.catalog.find_product(id).await.unwrap().unwrap();
    assert_eq!(product.stock, 0);
}

#[tokio::test]
async fn sale_uses_list_price_and_purchase_cost_for_margin() {
    let env = synced_env().await;
    let id = product_id(&env, "SAP-VAI-01").await;
    restock(&env, id, 10, 6_500).await;

    let transaction = env.state.inventory.register_sale(&sale(id, 2)).await.unwrap();

    assert_eq!(transaction.unit_price, Decimal::from(10_000));
    assert_eq!(transaction.total, Decimal::from(20_000));
    assert_eq!(transaction.margin, Some(Decimal::from(7_000)));

    let now = Utc::now();
    let earnings = env
        .state
        .inventory
        .earnings(now - Duration::hours(1), now + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(earnings.transaction_count, 1);
    assert_eq!(earnings.total_sales, Decimal::from(20_000));
    assert_eq!(earnings.total_margin, Decimal::from(7_000));
}

#[tokio::test]
async fn selling_down_to_the_minimum_raises_low_stock() {
    let env = synced_env().await;
    let id = product_id(&env, "SAP-LAV-03").await;
    restock(&env, id, 5, 2_000).await;

    env.state.inventory.register_sale(&sale(id, 1)).await.unwrap();
    let low_stock = |env: &TestEnv| {
        let notifications = env.state.notifications.clone();
        async move {
            notifications
                .unread()
                .await
                .unwrap()
                .into_iter()
                .filter(|n| n.kind == NotificationKind::LowStock && n.product_id == Some(id))
                .count()
        }
    };
    assert_eq!(low_stock(&env).await, 0);

    env.state.inventory.register_sale(&sale(id, 1)).await.unwrap();
    assert_eq!(low_stock(&env).await, 1);

    let listed = env.state.inventory.low_stock_products().await.unwrap();
    assert!(listed.iter().any(|p| p.id == id && p.stock == 3));
}

#[tokio::test]
async fn reversed_earnings_window_is_rejected() {
    let env = synced_env().await;
    let now = Utc::now();

    let err = env
        .state
        .inventory
        .earnings(now, now - Duration::days(1))
        .await
        .unwrap_err();

    assert!(matches!(err, CatalogError::Validation(_)));
}
