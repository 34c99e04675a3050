use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use sha2::{Digest, Sha512};

use crate::db::queries;
use crate::models::{BookingStatus, PaymentStatus};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct PaymentNotification {
    pub order_id: String,
    pub transaction_status: String,
    pub fraud_status: Option<String>,
    pub signature_key: String,
    pub gross_amount: String,
    pub status_code: String,
}

/// The gateway signs `order_id + status_code + gross_amount + server_key`
/// with SHA-512, hex encoded.
fn verify_signature(notification: &PaymentNotification, server_key: &str) -> bool {
    let payload = format!(
        "{}{}{}{}",
        notification.order_id, notification.status_code, notification.gross_amount, server_key
    );
    let digest = hex::encode(Sha512::digest(payload.as_bytes()));
    digest == notification.signature_key
}

// POST /webhook/payment
//
// External, idempotent trigger: it may be delivered more than once for the
// same transaction and must verify authenticity before any state change.
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    Json(notification): Json<PaymentNotification>,
) -> Response {
    // Empty server key = dev mode, signature check skipped.
    if !state.config.payment_server_key.is_empty()
        && !verify_signature(&notification, &state.config.payment_server_key)
    {
        tracing::warn!(order_id = %notification.order_id, "invalid payment signature");
        return (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({"error": "invalid signature"})),
        )
            .into_response();
    }

    let booking_id = match notification.order_id.strip_prefix("BOOKING-") {
        Some(id) if !id.is_empty() => id,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "unrecognized order id"})),
            )
                .into_response();
        }
    };

    let now = state.clock.now();
    let db = state.db.lock().unwrap();

    let booking = match queries::get_booking(&db, booking_id) {
        Ok(Some(b)) => b,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"error": "booking not found"})),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to load booking for webhook");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let fraud_denied = notification.fraud_status.as_deref() == Some("deny");

    let outcome = match notification.transaction_status.as_str() {
        "settlement" | "capture" if !fraud_denied => {
            if booking.payment_status == PaymentStatus::Paid {
                // redelivery of a settled transaction, nothing to do
                None
            } else {
                // successful settlement nudges pending bookings to confirmed
                let next_status = (booking.status == BookingStatus::Pending)
                    .then_some(BookingStatus::Confirmed);
                Some((PaymentStatus::Paid, next_status))
            }
        }
        "expire" | "cancel" | "deny" => Some((PaymentStatus::Failed, None)),
        "settlement" | "capture" => Some((PaymentStatus::Failed, None)), // fraud denied
        "pending" => None,
        other => {
            tracing::warn!(transaction_status = %other, "unknown transaction status");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "unknown transaction status"})),
            )
                .into_response();
        }
    };

    if let Some((payment_status, next_status)) = outcome {
        if let Err(e) = queries::record_payment(&db, booking_id, payment_status, next_status, now)
        {
            tracing::error!(error = %e, "failed to record payment result");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        tracing::info!(
            booking_id = %booking_id,
            payment_status = payment_status.as_str(),
            "payment webhook applied"
        );
    }

    Json(serde_json::json!({"status": "ok"})).into_response()
}
