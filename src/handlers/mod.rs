pub mod availability;
pub mod bookings;
pub mod discounts;
pub mod health;
pub mod webhook;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Bearer-token check for admin-only routes.
pub(crate) fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), Response> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token != expected_token {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "unauthorized"})),
        )
            .into_response());
    }
    Ok(())
}

pub(crate) fn is_admin(headers: &HeaderMap, expected_token: &str) -> bool {
    check_auth(headers, expected_token).is_ok()
}
