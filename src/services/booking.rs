use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::schedule;
use crate::models::{Booking, BookingStatus, DiscountUsage, PaymentStatus};
use crate::services::pricing::{self, DiscountRejection};

#[derive(Debug, Clone)]
pub struct CreateBookingRequest {
    pub customer_id: i64,
    pub barber_id: i64,
    pub service_id: i64,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub notes: Option<String>,
    pub discount_code: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub enum Actor {
    Customer(i64),
    Admin,
}

fn add_minutes(time: NaiveTime, minutes: i64) -> Option<NaiveTime> {
    let total = (time.num_seconds_from_midnight() / 60) as i64 + minutes;
    if total >= 24 * 60 {
        return None;
    }
    NaiveTime::from_num_seconds_from_midnight_opt((total * 60) as u32, 0)
}

fn overlaps(intervals: &[(NaiveTime, NaiveTime)], start: NaiveTime, end: NaiveTime) -> bool {
    intervals
        .iter()
        .any(|(b_start, b_end)| start < *b_end && end > *b_start)
}

/// Validates, prices and persists a booking. The conflict re-check, the
/// booking insert and the discount ledger update all happen inside one
/// transaction, so of two concurrent commits for overlapping slots (or the
/// last unit of a limited discount) exactly one succeeds.
pub fn create_booking(
    conn: &mut Connection,
    req: &CreateBookingRequest,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    if req.date < now.date() {
        return Err(AppError::Validation(
            "booking date must not be in the past".to_string(),
        ));
    }
    if !queries::customer_exists(conn, req.customer_id)? {
        return Err(AppError::NotFound("customer not found".to_string()));
    }
    if !queries::barber_exists(conn, req.barber_id)? {
        return Err(AppError::NotFound("barber not found".to_string()));
    }

    let (service, offering) = queries::get_barber_service(conn, req.barber_id, req.service_id)?
        .ok_or_else(|| AppError::NotFound("barber does not offer this service".to_string()))?;
    let duration = offering.effective_duration(&service);
    if duration <= 0 {
        return Err(AppError::Validation(
            "service has an invalid duration".to_string(),
        ));
    }
    let original_price = offering.effective_price(&service);

    if queries::is_on_time_off(conn, req.barber_id, req.date)? {
        return Err(AppError::SlotUnavailable);
    }

    let working = match queries::get_schedule(conn, req.barber_id, schedule::day_of_week(req.date))?
    {
        Some(s) if s.is_available => s,
        _ => return Err(AppError::SlotUnavailable),
    };

    let end_time = add_minutes(req.start_time, duration).ok_or_else(|| {
        AppError::Validation("appointment would run past midnight".to_string())
    })?;
    if req.start_time < working.start_time || end_time > working.end_time {
        return Err(AppError::Validation(
            "requested time is outside working hours".to_string(),
        ));
    }

    let tx = conn.transaction().map_err(anyhow::Error::from)?;

    // Mandatory re-check: the availability listing the customer saw may be
    // stale by the time we commit.
    let reserved = queries::booked_intervals(&tx, req.barber_id, req.date)?;
    if overlaps(&reserved, req.start_time, end_time) {
        return Err(AppError::SlotUnavailable);
    }

    let quote = pricing::apply_discount(
        &tx,
        req.discount_code.as_deref(),
        service.id,
        service.category_id,
        req.barber_id,
        original_price,
        req.customer_id,
        now,
    )?;

    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        customer_id: req.customer_id,
        barber_id: req.barber_id,
        service_id: req.service_id,
        booking_date: req.date,
        start_time: req.start_time,
        end_time,
        status: BookingStatus::Pending,
        payment_status: PaymentStatus::Unpaid,
        original_price,
        discount_id: quote.discount_id,
        discount_amount: quote.discount_amount,
        total_price: quote.total_price,
        notes: req.notes.clone(),
        cancelled_at: None,
        cancel_reason: None,
        created_at: now,
        updated_at: now,
    };
    queries::insert_booking(&tx, &booking)?;

    if let Some(discount_id) = quote.discount_id {
        // Compare-and-increment guards the quota against a concurrent
        // booking that passed validation with the same counter value.
        if !queries::try_increment_used_count(&tx, discount_id)? {
            return Err(AppError::DiscountRejected(
                DiscountRejection::GlobalLimitExceeded,
            ));
        }
        queries::insert_usage(
            &tx,
            &DiscountUsage {
                id: Uuid::new_v4().to_string(),
                discount_id,
                customer_id: req.customer_id,
                booking_id: booking.id.clone(),
                original_amount: original_price,
                discount_amount: quote.discount_amount,
                final_amount: quote.total_price,
                created_at: now,
            },
        )?;
        queries::increment_customer_discount(&tx, req.customer_id, discount_id)?;
    }

    tx.commit().map_err(anyhow::Error::from)?;

    tracing::info!(
        booking_id = %booking.id,
        barber_id = booking.barber_id,
        total_price = booking.total_price,
        "booking created"
    );
    Ok(booking)
}

pub fn cancel_booking(
    conn: &Connection,
    booking_id: &str,
    actor: Actor,
    reason: Option<&str>,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let booking = queries::get_booking(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;

    if let Actor::Customer(customer_id) = actor {
        if customer_id != booking.customer_id {
            return Err(AppError::Authorization(
                "only the booking owner may cancel it".to_string(),
            ));
        }
    }

    if !matches!(
        booking.status,
        BookingStatus::Pending | BookingStatus::Confirmed
    ) {
        return Err(AppError::StateConflict(format!(
            "a {} booking cannot be cancelled",
            booking.status.as_str()
        )));
    }
    if !booking.can_be_cancelled(now) {
        return Err(AppError::StateConflict(
            "bookings can only be cancelled at least 30 minutes before the start time".to_string(),
        ));
    }

    queries::mark_cancelled(conn, booking_id, reason, now)?;
    queries::get_booking(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))
}

/// Barber/admin-driven lifecycle progression.
pub fn update_status(
    conn: &Connection,
    booking_id: &str,
    next: BookingStatus,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let booking = queries::get_booking(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;

    if !booking.status.can_transition_to(next) {
        return Err(AppError::StateConflict(format!(
            "cannot move booking from {} to {}",
            booking.status.as_str(),
            next.as_str()
        )));
    }

    if next == BookingStatus::Cancelled {
        queries::mark_cancelled(conn, booking_id, None, now)?;
    } else {
        queries::update_booking_status(conn, booking_id, next, now)?;
    }
    queries::get_booking(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))
}

/// A completed booking is reviewable exactly once; the barber's aggregate
/// rating is recomputed in the same transaction as the review insert.
pub fn create_review(
    conn: &mut Connection,
    booking_id: &str,
    customer_id: i64,
    rating: i64,
    comment: Option<&str>,
    now: NaiveDateTime,
) -> Result<String, AppError> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::Validation(
            "rating must be between 1 and 5".to_string(),
        ));
    }

    let booking = queries::get_booking(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;

    if booking.customer_id != customer_id {
        return Err(AppError::Authorization(
            "only the booking owner may leave a review".to_string(),
        ));
    }
    if booking.status != BookingStatus::Completed {
        return Err(AppError::StateConflict(
            "only completed bookings can be reviewed".to_string(),
        ));
    }
    if queries::review_exists(conn, booking_id)? {
        return Err(AppError::StateConflict(
            "this booking has already been reviewed".to_string(),
        ));
    }

    let review_id = Uuid::new_v4().to_string();
    let tx = conn.transaction().map_err(anyhow::Error::from)?;
    queries::insert_review(
        &tx,
        &review_id,
        booking_id,
        customer_id,
        booking.barber_id,
        rating,
        comment,
        now,
    )?;
    queries::refresh_barber_rating(&tx, booking.barber_id)?;
    tx.commit().map_err(anyhow::Error::from)?;

    Ok(review_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{AppliesTo, Discount, DiscountType, ServiceOffering, WorkingSchedule};

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    struct Fixture {
        customer_id: i64,
        barber_id: i64,
        service_id: i64,
    }

    // Barber working Mon-Sat 09:00-18:00; 30 min / 50000 service.
    fn seed(conn: &Connection) -> Fixture {
        let barber_id = queries::create_barber(conn, "Ben").unwrap();
        let customer_id = queries::create_customer(conn, "Nia").unwrap();
        let category_id = queries::create_category(conn, "Cuts").unwrap();
        let service_id =
            queries::create_service(conn, category_id, "Classic Cut", 50000, 30).unwrap();
        queries::upsert_offering(
            conn,
            &ServiceOffering {
                barber_id,
                service_id,
                custom_price: None,
                custom_duration: None,
                is_available: true,
            },
        )
        .unwrap();
        for dow in 1..=6 {
            queries::upsert_schedule(
                conn,
                &WorkingSchedule {
                    barber_id,
                    day_of_week: dow,
                    start_time: t("09:00"),
                    end_time: t("18:00"),
                    is_available: true,
                },
            )
            .unwrap();
        }
        Fixture {
            customer_id,
            barber_id,
            service_id,
        }
    }

    fn request(fx: &Fixture, date: &str, start: &str) -> CreateBookingRequest {
        CreateBookingRequest {
            customer_id: fx.customer_id,
            barber_id: fx.barber_id,
            service_id: fx.service_id,
            date: d(date),
            start_time: t(start),
            notes: None,
            discount_code: None,
        }
    }

    const NOW: &str = "2025-06-16 08:00";

    #[test]
    fn test_create_booking_happy_path() {
        let mut conn = db::init_db(":memory:").unwrap();
        let fx = seed(&conn);

        let booking =
            create_booking(&mut conn, &request(&fx, "2025-06-16", "10:00"), dt(NOW)).unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.payment_status, PaymentStatus::Unpaid);
        assert_eq!(booking.end_time, t("10:30"));
        assert_eq!(booking.original_price, 50000);
        assert_eq!(booking.total_price, 50000);
        assert_eq!(booking.discount_id, None);
    }

    #[test]
    fn test_past_date_rejected() {
        let mut conn = db::init_db(":memory:").unwrap();
        let fx = seed(&conn);

        let result = create_booking(&mut conn, &request(&fx, "2025-06-15", "10:00"), dt(NOW));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_outside_working_hours_rejected() {
        let mut conn = db::init_db(":memory:").unwrap();
        let fx = seed(&conn);

        let result = create_booking(&mut conn, &request(&fx, "2025-06-16", "08:00"), dt(NOW));
        assert!(matches!(result, Err(AppError::Validation(_))));

        // 17:45 + 30 min runs past 18:00
        let result = create_booking(&mut conn, &request(&fx, "2025-06-16", "17:45"), dt(NOW));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_day_without_schedule_rejected() {
        let mut conn = db::init_db(":memory:").unwrap();
        let fx = seed(&conn);

        // 2025-06-22 is a Sunday; no schedule row seeded
        let result = create_booking(&mut conn, &request(&fx, "2025-06-22", "10:00"), dt(NOW));
        assert!(matches!(result, Err(AppError::SlotUnavailable)));
    }

    #[test]
    fn test_time_off_blocks_booking() {
        let mut conn = db::init_db(":memory:").unwrap();
        let fx = seed(&conn);
        queries::add_time_off(&conn, fx.barber_id, d("2025-06-16"), d("2025-06-17"), None)
            .unwrap();

        let result = create_booking(&mut conn, &request(&fx, "2025-06-16", "10:00"), dt(NOW));
        assert!(matches!(result, Err(AppError::SlotUnavailable)));

        // day after the range is bookable again
        let booking =
            create_booking(&mut conn, &request(&fx, "2025-06-18", "10:00"), dt(NOW)).unwrap();
        assert_eq!(booking.booking_date, d("2025-06-18"));
    }

    #[test]
    fn test_overlapping_commit_fails() {
        let mut conn = db::init_db(":memory:").unwrap();
        let fx = seed(&conn);

        create_booking(&mut conn, &request(&fx, "2025-06-16", "10:00"), dt(NOW)).unwrap();

        let result = create_booking(&mut conn, &request(&fx, "2025-06-16", "10:00"), dt(NOW));
        assert!(matches!(result, Err(AppError::SlotUnavailable)));

        // adjacent slot commits fine (half-open intervals)
        let booking =
            create_booking(&mut conn, &request(&fx, "2025-06-16", "10:30"), dt(NOW)).unwrap();
        assert_eq!(booking.start_time, t("10:30"));
    }

    fn limited_discount(conn: &Connection, code: &str, usage_limit: i64) -> i64 {
        queries::create_discount(
            conn,
            &Discount {
                id: 0,
                code: Some(code.to_string()),
                name: code.to_string(),
                discount_type: DiscountType::Percentage,
                value: 10,
                max_discount_amount: None,
                min_order_amount: None,
                start_date: d("2025-01-01"),
                end_date: d("2025-12-31"),
                usage_limit: Some(usage_limit),
                used_count: 0,
                customer_usage_limit: None,
                applies_to: AppliesTo::All,
                is_active: true,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_discount_applied_and_ledger_recorded() {
        let mut conn = db::init_db(":memory:").unwrap();
        let fx = seed(&conn);
        let discount_id = limited_discount(&conn, "TEN", 5);

        let mut req = request(&fx, "2025-06-16", "10:00");
        req.discount_code = Some("TEN".to_string());
        let booking = create_booking(&mut conn, &req, dt(NOW)).unwrap();

        assert_eq!(booking.discount_id, Some(discount_id));
        assert_eq!(booking.discount_amount, 5000);
        assert_eq!(booking.total_price, 45000);

        assert_eq!(queries::get_discount_used_count(&conn, discount_id).unwrap(), 1);
        assert_eq!(
            queries::customer_usage_count(&conn, discount_id, fx.customer_id).unwrap(),
            1
        );
        let grant = queries::get_customer_discount(&conn, fx.customer_id, discount_id)
            .unwrap()
            .unwrap();
        assert_eq!(grant.used_count, 1);
    }

    #[test]
    fn test_quota_exhaustion_rejects_next_booking() {
        let mut conn = db::init_db(":memory:").unwrap();
        let fx = seed(&conn);
        let discount_id = limited_discount(&conn, "LASTONE", 1);

        let mut first = request(&fx, "2025-06-16", "10:00");
        first.discount_code = Some("LASTONE".to_string());
        create_booking(&mut conn, &first, dt(NOW)).unwrap();

        let mut second = request(&fx, "2025-06-16", "11:00");
        second.discount_code = Some("LASTONE".to_string());
        let result = create_booking(&mut conn, &second, dt(NOW));
        assert!(matches!(
            result,
            Err(AppError::DiscountRejected(
                DiscountRejection::GlobalLimitExceeded
            ))
        ));

        // counter settled at exactly the limit, and the failed attempt
        // left no booking behind
        assert_eq!(queries::get_discount_used_count(&conn, discount_id).unwrap(), 1);
        assert_eq!(
            queries::booked_intervals(&conn, fx.barber_id, d("2025-06-16"))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_custom_price_override_used() {
        let mut conn = db::init_db(":memory:").unwrap();
        let fx = seed(&conn);
        queries::upsert_offering(
            &conn,
            &ServiceOffering {
                barber_id: fx.barber_id,
                service_id: fx.service_id,
                custom_price: Some(75000),
                custom_duration: None,
                is_available: true,
            },
        )
        .unwrap();

        let booking =
            create_booking(&mut conn, &request(&fx, "2025-06-16", "10:00"), dt(NOW)).unwrap();
        assert_eq!(booking.original_price, 75000);
    }

    #[test]
    fn test_cancel_before_cutoff() {
        let mut conn = db::init_db(":memory:").unwrap();
        let fx = seed(&conn);
        let booking =
            create_booking(&mut conn, &request(&fx, "2025-06-16", "10:00"), dt(NOW)).unwrap();

        // 31 minutes before start
        let cancelled = cancel_booking(
            &conn,
            &booking.id,
            Actor::Customer(fx.customer_id),
            Some("changed my mind"),
            dt("2025-06-16 09:29"),
        )
        .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());
        assert_eq!(cancelled.cancel_reason.as_deref(), Some("changed my mind"));
    }

    #[test]
    fn test_cancel_within_cutoff_rejected() {
        let mut conn = db::init_db(":memory:").unwrap();
        let fx = seed(&conn);
        let booking =
            create_booking(&mut conn, &request(&fx, "2025-06-16", "10:00"), dt(NOW)).unwrap();

        // 20 minutes before start
        let result = cancel_booking(
            &conn,
            &booking.id,
            Actor::Customer(fx.customer_id),
            None,
            dt("2025-06-16 09:40"),
        );
        assert!(matches!(result, Err(AppError::StateConflict(_))));
    }

    #[test]
    fn test_cancel_by_non_owner_forbidden() {
        let mut conn = db::init_db(":memory:").unwrap();
        let fx = seed(&conn);
        let stranger = queries::create_customer(&conn, "Omar").unwrap();
        let booking =
            create_booking(&mut conn, &request(&fx, "2025-06-16", "10:00"), dt(NOW)).unwrap();

        let result = cancel_booking(&conn, &booking.id, Actor::Customer(stranger), None, dt(NOW));
        assert!(matches!(result, Err(AppError::Authorization(_))));

        // admin may cancel regardless of ownership
        let cancelled = cancel_booking(&conn, &booking.id, Actor::Admin, None, dt(NOW)).unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
    }

    #[test]
    fn test_status_progression_and_invalid_transition() {
        let mut conn = db::init_db(":memory:").unwrap();
        let fx = seed(&conn);
        let booking =
            create_booking(&mut conn, &request(&fx, "2025-06-16", "10:00"), dt(NOW)).unwrap();

        let b = update_status(&conn, &booking.id, BookingStatus::Confirmed, dt(NOW)).unwrap();
        assert_eq!(b.status, BookingStatus::Confirmed);
        let b = update_status(&conn, &booking.id, BookingStatus::InProgress, dt(NOW)).unwrap();
        assert_eq!(b.status, BookingStatus::InProgress);

        // in_progress bookings cannot be cancelled
        let result = update_status(&conn, &booking.id, BookingStatus::Cancelled, dt(NOW));
        assert!(matches!(result, Err(AppError::StateConflict(_))));

        let b = update_status(&conn, &booking.id, BookingStatus::Completed, dt(NOW)).unwrap();
        assert_eq!(b.status, BookingStatus::Completed);

        // terminal
        let result = update_status(&conn, &booking.id, BookingStatus::Confirmed, dt(NOW));
        assert!(matches!(result, Err(AppError::StateConflict(_))));
    }

    fn completed_booking(conn: &mut Connection, fx: &Fixture) -> Booking {
        let booking = create_booking(conn, &request(fx, "2025-06-16", "10:00"), dt(NOW)).unwrap();
        update_status(conn, &booking.id, BookingStatus::Confirmed, dt(NOW)).unwrap();
        update_status(conn, &booking.id, BookingStatus::InProgress, dt(NOW)).unwrap();
        update_status(conn, &booking.id, BookingStatus::Completed, dt(NOW)).unwrap()
    }

    #[test]
    fn test_review_once_and_rating_refresh() {
        let mut conn = db::init_db(":memory:").unwrap();
        let fx = seed(&conn);
        let booking = completed_booking(&mut conn, &fx);

        create_review(&mut conn, &booking.id, fx.customer_id, 4, Some("solid cut"), dt(NOW))
            .unwrap();
        let (rating, count) = queries::get_barber_rating(&conn, fx.barber_id).unwrap();
        assert_eq!(count, 1);
        assert!((rating - 4.0).abs() < f64::EPSILON);

        // second review for the same booking is refused
        let result = create_review(&mut conn, &booking.id, fx.customer_id, 5, None, dt(NOW));
        assert!(matches!(result, Err(AppError::StateConflict(_))));
    }

    #[test]
    fn test_review_requires_completed_status() {
        let mut conn = db::init_db(":memory:").unwrap();
        let fx = seed(&conn);
        let booking =
            create_booking(&mut conn, &request(&fx, "2025-06-16", "10:00"), dt(NOW)).unwrap();

        let result = create_review(&mut conn, &booking.id, fx.customer_id, 5, None, dt(NOW));
        assert!(matches!(result, Err(AppError::StateConflict(_))));
    }

    #[test]
    fn test_rating_averages_across_reviews() {
        let mut conn = db::init_db(":memory:").unwrap();
        let fx = seed(&conn);

        let first = completed_booking(&mut conn, &fx);
        create_review(&mut conn, &first.id, fx.customer_id, 5, None, dt(NOW)).unwrap();

        let mut req = request(&fx, "2025-06-16", "11:00");
        req.notes = Some("second visit".to_string());
        let second = create_booking(&mut conn, &req, dt(NOW)).unwrap();
        update_status(&conn, &second.id, BookingStatus::Confirmed, dt(NOW)).unwrap();
        update_status(&conn, &second.id, BookingStatus::InProgress, dt(NOW)).unwrap();
        update_status(&conn, &second.id, BookingStatus::Completed, dt(NOW)).unwrap();
        create_review(&mut conn, &second.id, fx.customer_id, 3, None, dt(NOW)).unwrap();

        let (rating, count) = queries::get_barber_rating(&conn, fx.barber_id).unwrap();
        assert_eq!(count, 2);
        assert!((rating - 4.0).abs() < f64::EPSILON);
    }
}
