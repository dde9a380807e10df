//! Manual sync trigger, sync status and the site's brand tree

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::error::ApiResult;
use crate::application::AppState;
use crate::application::sync_service::{SyncOutcome, SyncSummary, SyncTrigger};
use crate::domain::errors::CatalogError;
use crate::domain::product::BrandNode;
use crate::domain::reconciliation::SyncMode;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub mode: SyncMode,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub running: bool,
    pub last_summary: Option<SyncSummary>,
}

/// `POST /sync`
pub async fn trigger_sync(State(state): State<AppState>, request: Option<Json<SyncRequest>>) -> ApiResult<Response> {
    let mode = request.map(|Json(r)| r.mode).unwrap_or_default();
    info!("🔄 Manual sync requested ({} mode)", mode);

    // the run must outlive the request if the client goes away
    let coordinator = state.coordinator.clone();
    let run = tokio::spawn(async move { coordinator.trigger(mode, SyncTrigger::Manual).await });
    let outcome = run.await.map_err(|e| {
        error!("❌ Sync task failed: {}", e);
        CatalogError::StorageUnavailable(format!("sync task failed: {}", e))
    })??;

    match outcome {
        SyncOutcome::Completed(summary) => Ok((StatusCode::OK, Json(summary)).into_response()),
        SyncOutcome::Skipped => Ok((StatusCode::CONFLICT, Json(SyncSummary::skipped(mode))).into_response()),
    }
}

/// `GET /sync/status`
pub async fn sync_status(State(state): State<AppState>) -> Json<SyncStatus> {
    Json(SyncStatus {
        running: state.coordinator.is_running(),
        last_summary: state.coordinator.last_summary().await,
    })
}

/// `GET /scraper/brands`
pub async fn brand_tree(State(state): State<AppState>) -> ApiResult<Json<Vec<BrandNode>>> {
    Ok(Json(state.source.brand_tree().await?))
}
