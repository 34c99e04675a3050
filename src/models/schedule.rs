use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// One row per barber per weekday. `day_of_week` uses 0 = Sunday.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingSchedule {
    pub barber_id: i64,
    pub day_of_week: u32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
}

pub fn day_of_week(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_sunday()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeOff {
    pub id: i64,
    pub barber_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
}

impl TimeOff {
    /// Both endpoints are inclusive.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_day_of_week_sunday_is_zero() {
        // 2025-06-15 is a Sunday, 2025-06-16 a Monday
        assert_eq!(day_of_week(d("2025-06-15")), 0);
        assert_eq!(day_of_week(d("2025-06-16")), 1);
        assert_eq!(day_of_week(d("2025-06-21")), 6);
    }

    #[test]
    fn test_time_off_range_inclusive() {
        let off = TimeOff {
            id: 1,
            barber_id: 1,
            start_date: d("2025-07-01"),
            end_date: d("2025-07-03"),
            reason: Some("holiday".to_string()),
        };
        assert!(off.contains(d("2025-07-01")));
        assert!(off.contains(d("2025-07-02")));
        assert!(off.contains(d("2025-07-03")));
        assert!(!off.contains(d("2025-06-30")));
        assert!(!off.contains(d("2025-07-04")));
    }
}
