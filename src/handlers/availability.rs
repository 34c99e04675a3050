use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::services::availability::{self, Slot};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SlotsQuery {
    pub service_id: i64,
    pub date: String,
}

// GET /api/barbers/:barber_id/slots?service_id=..&date=YYYY-MM-DD
pub async fn get_slots(
    State(state): State<Arc<AppState>>,
    Path(barber_id): Path<i64>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<Vec<Slot>>, AppError> {
    let date = NaiveDate::parse_from_str(&query.date, "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("invalid date: {}", query.date)))?;

    let db = state.db.lock().unwrap();
    if !queries::barber_exists(&db, barber_id)? {
        return Err(AppError::NotFound("barber not found".to_string()));
    }

    // A day inside a time-off range has no slots at all.
    if queries::is_on_time_off(&db, barber_id, date)? {
        return Ok(Json(vec![]));
    }

    let slots = availability::available_slots(
        &db,
        barber_id,
        query.service_id,
        date,
        state.config.slot_interval_minutes,
    )?;
    Ok(Json(slots))
}
