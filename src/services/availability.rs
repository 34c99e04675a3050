use chrono::{NaiveDate, NaiveTime, Timelike};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::schedule;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Slot {
    #[serde(serialize_with = "serialize_time")]
    pub time: NaiveTime,
    pub available: bool,
}

fn serialize_time<S: serde::Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&t.format("%H:%M").to_string())
}

fn minutes_from_midnight(t: NaiveTime) -> i64 {
    (t.num_seconds_from_midnight() / 60) as i64
}

fn time_from_minutes(m: i64) -> NaiveTime {
    NaiveTime::from_num_seconds_from_midnight_opt((m * 60) as u32, 0)
        .unwrap_or(NaiveTime::MIN)
}

/// Candidate start times across a working window, walked in fixed
/// increments. A slot is only emitted when it fits entirely inside the
/// window, and is unavailable when it overlaps any reserved interval
/// (half-open test: `start < b_end && end > b_start`).
pub fn generate_slots(
    window_start: NaiveTime,
    window_end: NaiveTime,
    duration_minutes: i64,
    interval_minutes: i64,
    booked: &[(NaiveTime, NaiveTime)],
) -> Vec<Slot> {
    let start = minutes_from_midnight(window_start);
    let end = minutes_from_midnight(window_end);
    let booked: Vec<(i64, i64)> = booked
        .iter()
        .map(|(s, e)| (minutes_from_midnight(*s), minutes_from_midnight(*e)))
        .collect();

    let mut slots = vec![];
    if duration_minutes <= 0 || interval_minutes <= 0 {
        return slots;
    }

    let mut current = start;
    while current + duration_minutes <= end {
        let slot_end = current + duration_minutes;
        let available = !booked
            .iter()
            .any(|(b_start, b_end)| current < *b_end && slot_end > *b_start);

        slots.push(Slot {
            time: time_from_minutes(current),
            available,
        });
        current += interval_minutes;
    }
    slots
}

/// Bookable start times for a barber/service/date. A missing or disabled
/// weekday schedule yields an empty list rather than an error; a barber not
/// offering the service at all is `NotFound`. Time-off is checked by the
/// caller so this stays a pure function of schedule plus reservations.
pub fn available_slots(
    conn: &Connection,
    barber_id: i64,
    service_id: i64,
    date: NaiveDate,
    interval_minutes: i64,
) -> Result<Vec<Slot>, AppError> {
    let (service, offering) = queries::get_barber_service(conn, barber_id, service_id)?
        .ok_or_else(|| AppError::NotFound("barber does not offer this service".to_string()))?;
    let duration = offering.effective_duration(&service);

    let schedule = match queries::get_schedule(conn, barber_id, schedule::day_of_week(date))? {
        Some(s) if s.is_available => s,
        _ => return Ok(vec![]),
    };

    let booked = queries::booked_intervals(conn, barber_id, date)?;

    Ok(generate_slots(
        schedule.start_time,
        schedule.end_time,
        duration,
        interval_minutes,
        &booked,
    ))
}
