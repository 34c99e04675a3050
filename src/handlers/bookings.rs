use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::{check_auth, is_admin};
use crate::models::{Booking, BookingStatus};
use crate::services::booking::{self, Actor, CreateBookingRequest};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateBookingPayload {
    pub customer_id: i64,
    pub barber_id: i64,
    pub service_id: i64,
    pub date: String,
    pub start_time: String,
    pub notes: Option<String>,
    pub discount_code: Option<String>,
}

fn parse_date(s: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("invalid date: {s}")))
}

fn parse_time(s: &str) -> Result<NaiveTime, AppError> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|_| AppError::Validation(format!("invalid time: {s}")))
}

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateBookingPayload>,
) -> Result<Json<Booking>, AppError> {
    let request = CreateBookingRequest {
        customer_id: payload.customer_id,
        barber_id: payload.barber_id,
        service_id: payload.service_id,
        date: parse_date(&payload.date)?,
        start_time: parse_time(&payload.start_time)?,
        notes: payload.notes,
        discount_code: payload.discount_code,
    };

    let now = state.clock.now();
    let mut db = state.db.lock().unwrap();
    let booking = booking::create_booking(&mut db, &request, now)?;
    Ok(Json(booking))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let db = state.db.lock().unwrap();
    let booking = queries::get_booking(&db, &id)?
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;
    Ok(Json(booking))
}

#[derive(Deserialize)]
pub struct CancelPayload {
    pub customer_id: Option<i64>,
    pub reason: Option<String>,
}

// POST /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<CancelPayload>,
) -> Result<Json<Booking>, AppError> {
    let actor = if is_admin(&headers, &state.config.admin_token) {
        Actor::Admin
    } else {
        let customer_id = payload.customer_id.ok_or_else(|| {
            AppError::Validation("customer_id is required".to_string())
        })?;
        Actor::Customer(customer_id)
    };

    let now = state.clock.now();
    let db = state.db.lock().unwrap();
    let booking = booking::cancel_booking(&db, &id, actor, payload.reason.as_deref(), now)?;
    Ok(Json(booking))
}

#[derive(Deserialize)]
pub struct StatusPayload {
    pub status: String,
}

// POST /api/bookings/:id/status — admin/barber action
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<StatusPayload>,
) -> Result<Json<Booking>, Response> {
    check_auth(&headers, &state.config.admin_token)?;

    let next = BookingStatus::parse(&payload.status).ok_or_else(|| {
        AppError::Validation(format!("unknown status: {}", payload.status)).into_response()
    })?;

    let now = state.clock.now();
    let db = state.db.lock().unwrap();
    let booking = booking::update_status(&db, &id, next, now).map_err(|e| e.into_response())?;
    Ok(Json(booking))
}

#[derive(Deserialize)]
pub struct ReviewPayload {
    pub customer_id: i64,
    pub rating: i64,
    pub comment: Option<String>,
}

// POST /api/bookings/:id/review
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<ReviewPayload>,
) -> Result<Json<serde_json::Value>, AppError> {
    let now = state.clock.now();
    let mut db = state.db.lock().unwrap();
    let review_id = booking::create_review(
        &mut db,
        &id,
        payload.customer_id,
        payload.rating,
        payload.comment.as_deref(),
        now,
    )?;
    Ok(Json(serde_json::json!({ "review_id": review_id })))
}
