//! Calendar-day arithmetic and spreadsheet serial dates
//!
//! All deltas are plain calendar days; no business-day or holiday handling.

use chrono::{Duration, NaiveDate, TimeZone, Utc};

use crate::{Task, Timestamp};

const MILLIS_PER_DAY: i64 = 86_400_000;
const SECONDS_PER_DAY: i64 = 86_400;

/// Absolute calendar-day delta between two instants, rounded up
pub fn day_difference(a: Timestamp, b: Timestamp) -> i64 {
    let millis = (a - b).num_milliseconds().abs();
    (millis + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY
}

/// Age of a task: start to completion if completed, else start to `now`
pub fn task_age(task: &Task, now: Timestamp) -> i64 {
    day_difference(task.start_date, task.completed_date.unwrap_or(now))
}

/// Day zero of the spreadsheet serial-date convention (1899-12-30)
pub fn spreadsheet_epoch() -> Timestamp {
    Utc.with_ymd_and_hms(1899, 12, 30, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Convert a numeric serial to an instant: `epoch + round(serial) days`
pub fn from_serial(serial: f64) -> Option<Timestamp> {
    if !serial.is_finite() {
        return None;
    }
    let days = serial.round();
    // Beyond year ~9999 chrono cannot represent the instant
    if days.abs() > 3_000_000.0 {
        return None;
    }
    spreadsheet_epoch().checked_add_signed(Duration::seconds(days as i64 * SECONDS_PER_DAY))
}

/// Convert a native spreadsheet date value, keeping the fractional day
pub fn from_serial_exact(serial: f64) -> Option<Timestamp> {
    if !serial.is_finite() || serial.abs() > 3_000_000.0 {
        return None;
    }
    let millis = (serial * MILLIS_PER_DAY as f64).round() as i64;
    spreadsheet_epoch().checked_add_signed(Duration::milliseconds(millis))
}

/// Serial value of an instant (whole and fractional days since the epoch)
pub fn to_serial(at: Timestamp) -> f64 {
    (at - spreadsheet_epoch()).num_milliseconds() as f64 / MILLIS_PER_DAY as f64
}

pub fn add_days(at: Timestamp, days: i64) -> Timestamp {
    at.checked_add_signed(Duration::days(days)).unwrap_or(at)
}

/// Midnight UTC of a calendar date
pub fn start_of_day(date: NaiveDate) -> Timestamp {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(year: i32, month: u32, day: u32) -> Timestamp {
        start_of_day(NaiveDate::from_ymd_opt(year, month, day).unwrap())
    }

    #[test]
    fn day_difference_is_symmetric() {
        let a = date(2025, 1, 1);
        let b = date(2025, 1, 11);
        assert_eq!(day_difference(a, b), 10);
        assert_eq!(day_difference(b, a), 10);
        assert_eq!(day_difference(a, a), 0);
    }

    #[test]
    fn day_difference_rounds_up_partial_days() {
        let a = date(2025, 1, 1);
        let b = a + Duration::hours(25);
        assert_eq!(day_difference(a, b), 2);
        let c = a + Duration::minutes(1);
        assert_eq!(day_difference(a, c), 1);
    }

    #[test]
    fn open_task_ages_against_now() {
        let task = Task::new("t", "t", date(2025, 1, 1));
        assert_eq!(task_age(&task, date(2025, 1, 21)), 20);
    }

    #[test]
    fn completed_task_age_is_frozen() {
        let task = Task::new("t", "t", date(2025, 1, 1)).completed_at(date(2025, 1, 6));
        assert_eq!(task_age(&task, date(2025, 12, 31)), 5);
    }

    #[test]
    fn serial_44927_is_2023_01_01() {
        assert_eq!(from_serial(44927.0), Some(date(2023, 1, 1)));
    }

    #[test]
    fn serial_rounds_to_whole_days() {
        assert_eq!(from_serial(44926.6), Some(date(2023, 1, 1)));
        assert_eq!(from_serial(0.0), Some(spreadsheet_epoch()));
        assert_eq!(from_serial(f64::NAN), None);
        assert_eq!(from_serial(1e12), None);
    }

    #[test]
    fn exact_serial_keeps_time_of_day() {
        let at = from_serial_exact(44927.5).unwrap();
        assert_eq!(at, date(2023, 1, 1) + Duration::hours(12));
        assert_eq!(to_serial(at), 44927.5);
    }
}
