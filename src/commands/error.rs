//! Mapping of domain errors onto HTTP responses

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use crate::domain::errors::CatalogError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub kind: &'static str,
}

#[derive(Debug)]
pub struct ApiError(pub CatalogError);

impl ApiError {
    pub const fn status(&self) -> StatusCode {
        match &self.0 {
            CatalogError::Validation(_) | CatalogError::Parse { .. } => StatusCode::BAD_REQUEST,
            CatalogError::NotFound { .. } => StatusCode::NOT_FOUND,
            CatalogError::InsufficientStock { .. }
            | CatalogError::PersistenceConflict { .. }
            | CatalogError::ReconciliationConflict { .. } => StatusCode::CONFLICT,
            CatalogError::Network { .. } | CatalogError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CatalogError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("❌ Request failed: {}", self.0);
        }
        let body = ErrorBody {
            success: false,
            error: self.0.to_string(),
            kind: self.0.kind(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(CatalogError::Validation("bad".into()), StatusCode::BAD_REQUEST)]
    #[case(CatalogError::not_found("product", 1), StatusCode::NOT_FOUND)]
    #[case(CatalogError::InsufficientStock { product_id: 1, requested: 2, available: 1 }, StatusCode::CONFLICT)]
    #[case(CatalogError::network("https://x.test", "down"), StatusCode::SERVICE_UNAVAILABLE)]
    #[case(CatalogError::Configuration("bad".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    fn status_mapping(#[case] err: CatalogError, #[case] status: StatusCode) {
        assert_eq!(ApiError(err).status(), status);
    }
}
