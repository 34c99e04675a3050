use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::services::pricing::DiscountRejection;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] anyhow::Error),

    #[error("{0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("that time slot is no longer available")]
    SlotUnavailable,

    #[error("{0}")]
    DiscountRejected(DiscountRejection),

    #[error("forbidden: {0}")]
    Authorization(String),

    #[error("{0}")]
    StateConflict(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "storage failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::SlotUnavailable => StatusCode::CONFLICT,
            AppError::DiscountRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::StateConflict(_) => StatusCode::CONFLICT,
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
