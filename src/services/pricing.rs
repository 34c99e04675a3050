use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::AppliesTo;

/// Why a discount code was rejected. Variants mirror the pipeline order and
/// their messages are surfaced verbatim to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscountRejection {
    CodeNotFound,
    DiscountInactive,
    OutOfWindow,
    GlobalLimitExceeded,
    BelowMinimum { min: i64 },
    NotApplicable,
    CustomerLimitExceeded,
}

impl std::fmt::Display for DiscountRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscountRejection::CodeNotFound => write!(f, "discount code not found"),
            DiscountRejection::DiscountInactive => write!(f, "this discount is not active"),
            DiscountRejection::OutOfWindow => {
                write!(f, "this discount is not valid at this time")
            }
            DiscountRejection::GlobalLimitExceeded => {
                write!(f, "this discount has reached its usage limit")
            }
            DiscountRejection::BelowMinimum { min } => {
                write!(f, "order total is below the minimum of {min} for this discount")
            }
            DiscountRejection::NotApplicable => {
                write!(f, "this discount does not apply to the selected service or barber")
            }
            DiscountRejection::CustomerLimitExceeded => {
                write!(f, "you have reached your usage limit for this discount")
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Quote {
    pub discount_id: Option<i64>,
    pub discount_amount: i64,
    pub total_price: i64,
}

impl Quote {
    fn without_discount(original_price: i64) -> Self {
        Self {
            discount_id: None,
            discount_amount: 0,
            total_price: original_price,
        }
    }
}

/// The single discount-validation pipeline, shared by the preview probe and
/// the booking commit so the two can never diverge. Checks short-circuit in
/// a fixed order; the first failure wins.
pub fn apply_discount(
    conn: &Connection,
    code: Option<&str>,
    service_id: i64,
    category_id: i64,
    barber_id: i64,
    original_price: i64,
    customer_id: i64,
    now: NaiveDateTime,
) -> Result<Quote, AppError> {
    let code = match code {
        Some(c) if !c.trim().is_empty() => c.trim(),
        _ => return Ok(Quote::without_discount(original_price)),
    };

    let discount = queries::get_discount_by_code(conn, code)?
        .ok_or(AppError::DiscountRejected(DiscountRejection::CodeNotFound))?;

    if !discount.is_active {
        return Err(AppError::DiscountRejected(
            DiscountRejection::DiscountInactive,
        ));
    }
    if !discount.is_within_window(now.date()) {
        return Err(AppError::DiscountRejected(DiscountRejection::OutOfWindow));
    }
    if discount.global_limit_reached() {
        return Err(AppError::DiscountRejected(
            DiscountRejection::GlobalLimitExceeded,
        ));
    }
    if let Some(min) = discount.min_order_amount {
        if original_price < min {
            return Err(AppError::DiscountRejected(DiscountRejection::BelowMinimum {
                min,
            }));
        }
    }
    if discount.applies_to == AppliesTo::Specific
        && !queries::applicability_matches(conn, discount.id, service_id, category_id, barber_id)?
    {
        return Err(AppError::DiscountRejected(DiscountRejection::NotApplicable));
    }
    if let Some(limit) = discount.customer_usage_limit {
        let used = queries::customer_usage_count(conn, discount.id, customer_id)?;
        if used >= limit {
            return Err(AppError::DiscountRejected(
                DiscountRejection::CustomerLimitExceeded,
            ));
        }
    }
    // A customer-specific grant carries its own expiry and cap.
    if let Some(grant) = queries::get_customer_discount(conn, customer_id, discount.id)? {
        if grant.is_expired(now) {
            return Err(AppError::DiscountRejected(DiscountRejection::OutOfWindow));
        }
        if grant.is_exhausted() {
            return Err(AppError::DiscountRejected(
                DiscountRejection::CustomerLimitExceeded,
            ));
        }
    }

    let discount_amount = discount.compute_amount(original_price);
    Ok(Quote {
        discount_id: Some(discount.id),
        discount_amount,
        total_price: original_price - discount_amount,
    })
}
