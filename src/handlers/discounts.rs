use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::services::pricing;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ValidatePayload {
    pub code: String,
    pub service_id: i64,
    pub barber_id: i64,
    pub original_price: i64,
    pub customer_id: i64,
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// POST /api/discounts/validate
//
// Price-preview probe. Runs the exact pipeline the booking commit runs, so
// a code accepted here cannot be refused at commit time (barring a
// concurrent quota exhaustion). Rejections come back as `valid: false`
// rather than an error status, since a bad code is an expected outcome.
pub async fn validate_discount(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ValidatePayload>,
) -> Result<Json<ValidateResponse>, AppError> {
    if payload.original_price < 0 {
        return Err(AppError::Validation(
            "original_price must not be negative".to_string(),
        ));
    }

    let now = state.clock.now();
    let db = state.db.lock().unwrap();

    let (service, _) = queries::get_barber_service(&db, payload.barber_id, payload.service_id)?
        .ok_or_else(|| AppError::NotFound("barber does not offer this service".to_string()))?;

    let result = pricing::apply_discount(
        &db,
        Some(&payload.code),
        service.id,
        service.category_id,
        payload.barber_id,
        payload.original_price,
        payload.customer_id,
        now,
    );

    match result {
        Ok(quote) => Ok(Json(ValidateResponse {
            valid: true,
            discount_amount: Some(quote.discount_amount),
            final_price: Some(quote.total_price),
            reason: None,
        })),
        Err(AppError::DiscountRejected(rejection)) => Ok(Json(ValidateResponse {
            valid: false,
            discount_amount: None,
            final_price: None,
            reason: Some(rejection.to_string()),
        })),
        Err(other) => Err(other),
    }
}
