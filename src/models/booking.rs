use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Customers may cancel up to this long before the scheduled start.
pub const CANCELLATION_CUTOFF_MINUTES: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub customer_id: i64,
    pub barber_id: i64,
    pub service_id: i64,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub original_price: i64,
    pub discount_id: Option<i64>,
    pub discount_amount: i64,
    pub total_price: i64,
    pub notes: Option<String>,
    pub cancelled_at: Option<NaiveDateTime>,
    pub cancel_reason: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Booking {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.booking_date.and_time(self.start_time)
    }

    /// Cancellable while pending or confirmed, and only up to the cutoff
    /// before the scheduled start.
    pub fn can_be_cancelled(&self, now: NaiveDateTime) -> bool {
        matches!(
            self.status,
            BookingStatus::Pending | BookingStatus::Confirmed
        ) && now + Duration::minutes(CANCELLATION_CUTOFF_MINUTES) <= self.starts_at()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "in_progress" => Some(BookingStatus::InProgress),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// pending -> confirmed -> in_progress -> completed, with cancellation
    /// allowed from pending and confirmed only.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, InProgress)
                | (InProgress, Completed)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Refunded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unpaid" => Some(PaymentStatus::Unpaid),
            "paid" => Some(PaymentStatus::Paid),
            "refunded" => Some(PaymentStatus::Refunded),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn booking(status: BookingStatus) -> Booking {
        Booking {
            id: "b-1".to_string(),
            customer_id: 1,
            barber_id: 1,
            service_id: 1,
            booking_date: NaiveDate::parse_from_str("2025-06-16", "%Y-%m-%d").unwrap(),
            start_time: NaiveTime::parse_from_str("10:00", "%H:%M").unwrap(),
            end_time: NaiveTime::parse_from_str("10:30", "%H:%M").unwrap(),
            status,
            payment_status: PaymentStatus::Unpaid,
            original_price: 50000,
            discount_id: None,
            discount_amount: 0,
            total_price: 50000,
            notes: None,
            cancelled_at: None,
            cancel_reason: None,
            created_at: dt("2025-06-10 12:00"),
            updated_at: dt("2025-06-10 12:00"),
        }
    }

    #[test]
    fn test_cancel_cutoff_thirty_one_minutes_before() {
        let b = booking(BookingStatus::Confirmed);
        assert!(b.can_be_cancelled(dt("2025-06-16 09:29")));
    }

    #[test]
    fn test_cancel_cutoff_exactly_thirty_minutes_before() {
        let b = booking(BookingStatus::Confirmed);
        assert!(b.can_be_cancelled(dt("2025-06-16 09:30")));
    }

    #[test]
    fn test_cancel_cutoff_twenty_minutes_before() {
        let b = booking(BookingStatus::Confirmed);
        assert!(!b.can_be_cancelled(dt("2025-06-16 09:40")));
    }

    #[test]
    fn test_cancel_rejected_for_non_cancellable_status() {
        let now = dt("2025-06-15 10:00");
        assert!(booking(BookingStatus::Pending).can_be_cancelled(now));
        assert!(booking(BookingStatus::Confirmed).can_be_cancelled(now));
        assert!(!booking(BookingStatus::InProgress).can_be_cancelled(now));
        assert!(!booking(BookingStatus::Completed).can_be_cancelled(now));
        assert!(!booking(BookingStatus::Cancelled).can_be_cancelled(now));
    }

    #[test]
    fn test_status_transitions() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Cancelled));

        assert!(!Pending.can_transition_to(InProgress));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!InProgress.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(InProgress));
        assert!(!Cancelled.can_transition_to(Pending));
    }

    #[test]
    fn test_terminal_states() {
        assert!(BookingStatus::Completed.is_terminal());
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(!BookingStatus::Confirmed.is_terminal());
    }
}
