use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{
    AppliesTo, Booking, BookingStatus, CustomerDiscount, Discount, DiscountType, DiscountUsage,
    PaymentStatus, Service, ServiceOffering, TargetType, WorkingSchedule,
};

const DATE_FMT: &str = "%Y-%m-%d";
const TIME_FMT: &str = "%H:%M";
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FMT).with_context(|| format!("invalid stored date: {s}"))
}

fn parse_time(s: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(s, TIME_FMT).with_context(|| format!("invalid stored time: {s}"))
}

fn parse_datetime(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATETIME_FMT)
        .with_context(|| format!("invalid stored datetime: {s}"))
}

// ── Identity / catalog ──

pub fn create_barber(conn: &Connection, name: &str) -> anyhow::Result<i64> {
    conn.execute("INSERT INTO barbers (name) VALUES (?1)", params![name])?;
    Ok(conn.last_insert_rowid())
}

pub fn create_customer(conn: &Connection, name: &str) -> anyhow::Result<i64> {
    conn.execute("INSERT INTO customers (name) VALUES (?1)", params![name])?;
    Ok(conn.last_insert_rowid())
}

pub fn create_category(conn: &Connection, name: &str) -> anyhow::Result<i64> {
    conn.execute("INSERT INTO categories (name) VALUES (?1)", params![name])?;
    Ok(conn.last_insert_rowid())
}

pub fn create_service(
    conn: &Connection,
    category_id: i64,
    name: &str,
    base_price: i64,
    duration_minutes: i64,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO services (category_id, name, base_price, duration_minutes)
         VALUES (?1, ?2, ?3, ?4)",
        params![category_id, name, base_price, duration_minutes],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn barber_exists(conn: &Connection, barber_id: i64) -> anyhow::Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM barbers WHERE id = ?1 AND is_active = 1",
        params![barber_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn customer_exists(conn: &Connection, customer_id: i64) -> anyhow::Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM customers WHERE id = ?1",
        params![customer_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn get_barber_rating(conn: &Connection, barber_id: i64) -> anyhow::Result<(f64, i64)> {
    let result = conn.query_row(
        "SELECT rating, rating_count FROM barbers WHERE id = ?1",
        params![barber_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(result)
}

// ── Schedules & time off ──

pub fn upsert_schedule(conn: &Connection, schedule: &WorkingSchedule) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO working_schedules (barber_id, day_of_week, start_time, end_time, is_available)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(barber_id, day_of_week) DO UPDATE SET
           start_time = excluded.start_time,
           end_time = excluded.end_time,
           is_available = excluded.is_available",
        params![
            schedule.barber_id,
            schedule.day_of_week,
            schedule.start_time.format(TIME_FMT).to_string(),
            schedule.end_time.format(TIME_FMT).to_string(),
            schedule.is_available,
        ],
    )?;
    Ok(())
}

pub fn get_schedule(
    conn: &Connection,
    barber_id: i64,
    day_of_week: u32,
) -> anyhow::Result<Option<WorkingSchedule>> {
    let row = conn
        .query_row(
            "SELECT barber_id, day_of_week, start_time, end_time, is_available
             FROM working_schedules WHERE barber_id = ?1 AND day_of_week = ?2",
            params![barber_id, day_of_week],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, bool>(4)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((barber_id, day_of_week, start, end, is_available)) => Ok(Some(WorkingSchedule {
            barber_id,
            day_of_week,
            start_time: parse_time(&start)?,
            end_time: parse_time(&end)?,
            is_available,
        })),
        None => Ok(None),
    }
}

pub fn add_time_off(
    conn: &Connection,
    barber_id: i64,
    start_date: NaiveDate,
    end_date: NaiveDate,
    reason: Option<&str>,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO time_off (barber_id, start_date, end_date, reason) VALUES (?1, ?2, ?3, ?4)",
        params![
            barber_id,
            start_date.format(DATE_FMT).to_string(),
            end_date.format(DATE_FMT).to_string(),
            reason,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Overlapping ranges are permitted; the union of all of them blocks the day.
pub fn is_on_time_off(conn: &Connection, barber_id: i64, date: NaiveDate) -> anyhow::Result<bool> {
    let date_str = date.format(DATE_FMT).to_string();
    let blocked: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM time_off
         WHERE barber_id = ?1 AND start_date <= ?2 AND end_date >= ?2",
        params![barber_id, date_str],
        |row| row.get(0),
    )?;
    Ok(blocked)
}

// ── Service offerings ──

pub fn upsert_offering(conn: &Connection, offering: &ServiceOffering) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO service_offerings (barber_id, service_id, custom_price, custom_duration, is_available)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(barber_id, service_id) DO UPDATE SET
           custom_price = excluded.custom_price,
           custom_duration = excluded.custom_duration,
           is_available = excluded.is_available",
        params![
            offering.barber_id,
            offering.service_id,
            offering.custom_price,
            offering.custom_duration,
            offering.is_available,
        ],
    )?;
    Ok(())
}

/// The catalog service together with the barber's binding of it, or `None`
/// if the barber does not currently offer the service.
pub fn get_barber_service(
    conn: &Connection,
    barber_id: i64,
    service_id: i64,
) -> anyhow::Result<Option<(Service, ServiceOffering)>> {
    let row = conn
        .query_row(
            "SELECT s.id, s.category_id, s.name, s.base_price, s.duration_minutes, s.is_active,
                    o.custom_price, o.custom_duration, o.is_available
             FROM service_offerings o
             JOIN services s ON s.id = o.service_id
             WHERE o.barber_id = ?1 AND o.service_id = ?2
               AND o.is_available = 1 AND s.is_active = 1",
            params![barber_id, service_id],
            |row| {
                let service = Service {
                    id: row.get(0)?,
                    category_id: row.get(1)?,
                    name: row.get(2)?,
                    base_price: row.get(3)?,
                    duration_minutes: row.get(4)?,
                    is_active: row.get(5)?,
                };
                let offering = ServiceOffering {
                    barber_id,
                    service_id,
                    custom_price: row.get(6)?,
                    custom_duration: row.get(7)?,
                    is_available: row.get(8)?,
                };
                Ok((service, offering))
            },
        )
        .optional()?;
    Ok(row)
}

// ── Bookings ──

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let status_str: String = row.get(7)?;
    let payment_str: String = row.get(8)?;
    let cancelled_at: Option<String> = row.get(14)?;

    Ok(Booking {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        barber_id: row.get(2)?,
        service_id: row.get(3)?,
        booking_date: parse_date(&row.get::<_, String>(4)?)?,
        start_time: parse_time(&row.get::<_, String>(5)?)?,
        end_time: parse_time(&row.get::<_, String>(6)?)?,
        status: BookingStatus::parse(&status_str)
            .with_context(|| format!("unknown booking status: {status_str}"))?,
        payment_status: PaymentStatus::parse(&payment_str)
            .with_context(|| format!("unknown payment status: {payment_str}"))?,
        original_price: row.get(9)?,
        discount_id: row.get(10)?,
        discount_amount: row.get(11)?,
        total_price: row.get(12)?,
        notes: row.get(13)?,
        cancelled_at: cancelled_at.as_deref().map(parse_datetime).transpose()?,
        cancel_reason: row.get(15)?,
        created_at: parse_datetime(&row.get::<_, String>(16)?)?,
        updated_at: parse_datetime(&row.get::<_, String>(17)?)?,
    })
}

const BOOKING_COLUMNS: &str = "id, customer_id, barber_id, service_id, booking_date, start_time, \
     end_time, status, payment_status, original_price, discount_id, discount_amount, total_price, \
     notes, cancelled_at, cancel_reason, created_at, updated_at";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"
        ),
        params![
            booking.id,
            booking.customer_id,
            booking.barber_id,
            booking.service_id,
            booking.booking_date.format(DATE_FMT).to_string(),
            booking.start_time.format(TIME_FMT).to_string(),
            booking.end_time.format(TIME_FMT).to_string(),
            booking.status.as_str(),
            booking.payment_status.as_str(),
            booking.original_price,
            booking.discount_id,
            booking.discount_amount,
            booking.total_price,
            booking.notes,
            booking
                .cancelled_at
                .map(|at| at.format(DATETIME_FMT).to_string()),
            booking.cancel_reason,
            booking.created_at.format(DATETIME_FMT).to_string(),
            booking.updated_at.format(DATETIME_FMT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let mut stmt = conn.prepare(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"))?;

    let row = stmt
        .query_row(params![id], |row| Ok(parse_booking_row(row)))
        .optional()?;
    row.transpose()
}

/// Reserved intervals for a barber on a date, cancelled bookings excluded.
pub fn booked_intervals(
    conn: &Connection,
    barber_id: i64,
    date: NaiveDate,
) -> anyhow::Result<Vec<(NaiveTime, NaiveTime)>> {
    let date_str = date.format(DATE_FMT).to_string();
    let mut stmt = conn.prepare(
        "SELECT start_time, end_time FROM bookings
         WHERE barber_id = ?1 AND booking_date = ?2 AND status != 'cancelled'
         ORDER BY start_time ASC",
    )?;

    let rows = stmt.query_map(params![barber_id, date_str], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut intervals = vec![];
    for row in rows {
        let (start, end) = row?;
        intervals.push((parse_time(&start)?, parse_time(&end)?));
    }
    Ok(intervals)
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
    now: NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![
            status.as_str(),
            now.format(DATETIME_FMT).to_string(),
            id
        ],
    )?;
    Ok(count > 0)
}

pub fn mark_cancelled(
    conn: &Connection,
    id: &str,
    reason: Option<&str>,
    now: NaiveDateTime,
) -> anyhow::Result<bool> {
    let now_str = now.format(DATETIME_FMT).to_string();
    let count = conn.execute(
        "UPDATE bookings
         SET status = 'cancelled', cancelled_at = ?1, cancel_reason = ?2, updated_at = ?1
         WHERE id = ?3",
        params![now_str, reason, id],
    )?;
    Ok(count > 0)
}

pub fn record_payment(
    conn: &Connection,
    id: &str,
    payment_status: PaymentStatus,
    new_status: Option<BookingStatus>,
    now: NaiveDateTime,
) -> anyhow::Result<bool> {
    let now_str = now.format(DATETIME_FMT).to_string();
    let count = match new_status {
        Some(status) => conn.execute(
            "UPDATE bookings SET payment_status = ?1, status = ?2, updated_at = ?3 WHERE id = ?4",
            params![payment_status.as_str(), status.as_str(), now_str, id],
        )?,
        None => conn.execute(
            "UPDATE bookings SET payment_status = ?1, updated_at = ?2 WHERE id = ?3",
            params![payment_status.as_str(), now_str, id],
        )?,
    };
    Ok(count > 0)
}

// ── Discounts ──

fn parse_discount_row(row: &rusqlite::Row) -> anyhow::Result<Discount> {
    let type_str: String = row.get(3)?;
    let applies_str: String = row.get(12)?;

    Ok(Discount {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        discount_type: DiscountType::parse(&type_str)
            .with_context(|| format!("unknown discount type: {type_str}"))?,
        value: row.get(4)?,
        max_discount_amount: row.get(5)?,
        min_order_amount: row.get(6)?,
        start_date: parse_date(&row.get::<_, String>(7)?)?,
        end_date: parse_date(&row.get::<_, String>(8)?)?,
        usage_limit: row.get(9)?,
        used_count: row.get(10)?,
        customer_usage_limit: row.get(11)?,
        applies_to: AppliesTo::parse(&applies_str)
            .with_context(|| format!("unknown discount scope: {applies_str}"))?,
        is_active: row.get(13)?,
    })
}

const DISCOUNT_COLUMNS: &str = "id, code, name, discount_type, value, max_discount_amount, \
     min_order_amount, start_date, end_date, usage_limit, used_count, customer_usage_limit, \
     applies_to, is_active";

pub fn create_discount(conn: &Connection, discount: &Discount) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO discounts (code, name, discount_type, value, max_discount_amount,
            min_order_amount, start_date, end_date, usage_limit, used_count,
            customer_usage_limit, applies_to, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            discount.code,
            discount.name,
            discount.discount_type.as_str(),
            discount.value,
            discount.max_discount_amount,
            discount.min_order_amount,
            discount.start_date.format(DATE_FMT).to_string(),
            discount.end_date.format(DATE_FMT).to_string(),
            discount.usage_limit,
            discount.used_count,
            discount.customer_usage_limit,
            discount.applies_to.as_str(),
            discount.is_active,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_discount_by_code(conn: &Connection, code: &str) -> anyhow::Result<Option<Discount>> {
    let mut stmt =
        conn.prepare(&format!("SELECT {DISCOUNT_COLUMNS} FROM discounts WHERE code = ?1"))?;

    let row = stmt
        .query_row(params![code], |row| Ok(parse_discount_row(row)))
        .optional()?;
    row.transpose()
}

pub fn get_discount_used_count(conn: &Connection, discount_id: i64) -> anyhow::Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT used_count FROM discounts WHERE id = ?1",
        params![discount_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn add_applicability(
    conn: &Connection,
    discount_id: i64,
    target_type: TargetType,
    target_id: i64,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO discount_applicability (discount_id, target_type, target_id)
         VALUES (?1, ?2, ?3)",
        params![discount_id, target_type.as_str(), target_id],
    )?;
    Ok(())
}

/// A `specific` discount is eligible iff at least one allow-list row matches
/// the booking's service, the service's category, or the barber.
pub fn applicability_matches(
    conn: &Connection,
    discount_id: i64,
    service_id: i64,
    category_id: i64,
    barber_id: i64,
) -> anyhow::Result<bool> {
    let matches: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM discount_applicability
         WHERE discount_id = ?1
           AND ((target_type = 'service' AND target_id = ?2)
             OR (target_type = 'category' AND target_id = ?3)
             OR (target_type = 'barber' AND target_id = ?4))",
        params![discount_id, service_id, category_id, barber_id],
        |row| row.get(0),
    )?;
    Ok(matches)
}

// ── Usage ledger ──

/// Compare-and-increment on the global counter. Returns false when the
/// usage limit is already reached, which must abort the enclosing
/// transaction. This is the only write path for `used_count`, so a
/// concurrent pair of bookings cannot oversell a limited discount.
pub fn try_increment_used_count(conn: &Connection, discount_id: i64) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE discounts SET used_count = used_count + 1
         WHERE id = ?1 AND (usage_limit IS NULL OR used_count < usage_limit)",
        params![discount_id],
    )?;
    Ok(count > 0)
}

pub fn insert_usage(conn: &Connection, usage: &DiscountUsage) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO discount_usages (id, discount_id, customer_id, booking_id,
            original_amount, discount_amount, final_amount, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            usage.id,
            usage.discount_id,
            usage.customer_id,
            usage.booking_id,
            usage.original_amount,
            usage.discount_amount,
            usage.final_amount,
            usage.created_at.format(DATETIME_FMT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn customer_usage_count(
    conn: &Connection,
    discount_id: i64,
    customer_id: i64,
) -> anyhow::Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM discount_usages WHERE discount_id = ?1 AND customer_id = ?2",
        params![discount_id, customer_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn upsert_customer_discount(
    conn: &Connection,
    grant: &CustomerDiscount,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO customer_discounts (customer_id, discount_id, used_count, max_usage, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(customer_id, discount_id) DO UPDATE SET
           used_count = excluded.used_count,
           max_usage = excluded.max_usage,
           expires_at = excluded.expires_at",
        params![
            grant.customer_id,
            grant.discount_id,
            grant.used_count,
            grant.max_usage,
            grant
                .expires_at
                .map(|at| at.format(DATETIME_FMT).to_string()),
        ],
    )?;
    Ok(())
}

pub fn get_customer_discount(
    conn: &Connection,
    customer_id: i64,
    discount_id: i64,
) -> anyhow::Result<Option<CustomerDiscount>> {
    let row = conn
        .query_row(
            "SELECT customer_id, discount_id, used_count, max_usage, expires_at
             FROM customer_discounts WHERE customer_id = ?1 AND discount_id = ?2",
            params![customer_id, discount_id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((customer_id, discount_id, used_count, max_usage, expires_at)) => {
            Ok(Some(CustomerDiscount {
                customer_id,
                discount_id,
                used_count,
                max_usage,
                expires_at: expires_at.as_deref().map(parse_datetime).transpose()?,
            }))
        }
        None => Ok(None),
    }
}

pub fn increment_customer_discount(
    conn: &Connection,
    customer_id: i64,
    discount_id: i64,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO customer_discounts (customer_id, discount_id, used_count)
         VALUES (?1, ?2, 1)
         ON CONFLICT(customer_id, discount_id) DO UPDATE SET
           used_count = used_count + 1",
        params![customer_id, discount_id],
    )?;
    Ok(())
}

// ── Reviews ──

pub fn review_exists(conn: &Connection, booking_id: &str) -> anyhow::Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM reviews WHERE booking_id = ?1",
        params![booking_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn insert_review(
    conn: &Connection,
    id: &str,
    booking_id: &str,
    customer_id: i64,
    barber_id: i64,
    rating: i64,
    comment: Option<&str>,
    now: NaiveDateTime,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO reviews (id, booking_id, customer_id, barber_id, rating, comment, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            booking_id,
            customer_id,
            barber_id,
            rating,
            comment,
            now.format(DATETIME_FMT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn refresh_barber_rating(conn: &Connection, barber_id: i64) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE barbers SET
           rating = COALESCE((SELECT AVG(rating) FROM reviews WHERE barber_id = ?1), 0),
           rating_count = (SELECT COUNT(*) FROM reviews WHERE barber_id = ?1)
         WHERE id = ?1",
        params![barber_id],
    )?;
    Ok(())
}
