//! Stock, ledger and report endpoints

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use super::error::ApiResult;
use crate::application::AppState;
use crate::domain::product::Product;
use crate::domain::transaction::{EarningsSummary, PurchaseRequest, SaleRequest, Transaction};

/// Report window when the query leaves it open
const DEFAULT_REPORT_DAYS: i64 = 30;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EarningsQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// `GET /products/low-stock`
pub async fn low_stock_products(State(state): State<AppState>) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(state.inventory.low_stock_products().await?))
}

/// `POST /transactions/sale`
pub async fn register_sale(
    State(state): State<AppState>,
    Json(request): Json<SaleRequest>,
) -> ApiResult<(StatusCode, Json<Transaction>)> {
    let transaction = state.inventory.register_sale(&request).await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

/// `POST /transactions/purchase`
pub async fn register_purchase(
    State(state): State<AppState>,
    Json(request): Json<PurchaseRequest>,
) -> ApiResult<(StatusCode, Json<Transaction>)> {
    let transaction = state.inventory.register_purchase(&request).await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

/// `GET /reports/earnings?from=..&to=..`
pub async fn earnings(
    State(state): State<AppState>,
    Query(query): Query<EarningsQuery>,
) -> ApiResult<Json<EarningsSummary>> {
    let to = query.to.unwrap_or_else(Utc::now);
    let from = query.from.unwrap_or_else(|| to - Duration::days(DEFAULT_REPORT_DAYS));
    Ok(Json(state.inventory.earnings(from, to).await?))
}
