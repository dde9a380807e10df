//! Notification inbox endpoints

use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;

use super::error::ApiResult;
use crate::application::AppState;
use crate::domain::notification::Notification;

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub success: bool,
    pub updated: u64,
}

/// `GET /notifications/unread`
pub async fn unread_notifications(State(state): State<AppState>) -> ApiResult<Json<Vec<Notification>>> {
    Ok(Json(state.notifications.unread().await?))
}

/// `POST /notifications/:id/read`
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path(notification_id): Path<i64>,
) -> ApiResult<Json<MarkReadResponse>> {
    state.notifications.mark_read(notification_id).await?;
    Ok(Json(MarkReadResponse {
        success: true,
        updated: 1,
    }))
}

/// `POST /notifications/read-all`
pub async fn mark_all_notifications_read(State(state): State<AppState>) -> ApiResult<Json<MarkReadResponse>> {
    let updated = state.notifications.mark_all_read().await?;
    Ok(Json(MarkReadResponse { success: true, updated }))
}
