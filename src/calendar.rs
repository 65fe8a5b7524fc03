//! Calendar helpers for cleaning weeks. All dates are UTC calendar days.

use chrono::{Datelike, Days, NaiveDate, Utc};

use crate::limits::MAX_REST_LEVEL;
use crate::model::{CleaningException, Ms, RestLevel, WeekdayEntry};

const WEEKDAY_LABELS: [&str; 5] = ["Mon", "Tue", "Wed", "Thu", "Fri"];

pub fn now_ms() -> Ms {
    Utc::now().timestamp_millis()
}

pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

/// Monday of the ISO week containing `date`. Sunday rolls back six days.
/// `None` when that Monday falls before the first representable date.
pub fn week_start_of(date: NaiveDate) -> Option<NaiveDate> {
    date.checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
}

/// Next rest level in the 1 → 2 → 3 → 1 cycle. Missing or out-of-range input restarts at 1.
pub fn next_rest_level(previous: Option<i32>) -> RestLevel {
    match previous {
        Some(p) if p >= 1 && p < i32::from(MAX_REST_LEVEL) => (p + 1) as RestLevel,
        _ => 1,
    }
}

/// Accepts only levels inside the rest cycle.
pub fn valid_rest_level(level: i32) -> Option<RestLevel> {
    if (1..=i32::from(MAX_REST_LEVEL)).contains(&level) {
        Some(level as RestLevel)
    } else {
        None
    }
}

/// Monday..Friday of the week starting at `monday`, flagged with any exception on that day.
///
/// Informational only: exceptions never change who cleans.
pub fn build_weekdays(monday: NaiveDate, exceptions: &[CleaningException]) -> Vec<WeekdayEntry> {
    WEEKDAY_LABELS
        .iter()
        .enumerate()
        .map_while(|(offset, label)| {
            let date = monday.checked_add_days(Days::new(offset as u64))?;
            let exception = exceptions.iter().find(|e| e.date == date);
            Some(WeekdayEntry {
                date,
                label: *label,
                excused: exception.is_some(),
                reason: exception.and_then(|e| e.reason.clone()),
            })
        })
        .collect()
}

/// Parse `YYYY-MM-DD` with a four-digit year.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .ok()
        .filter(|d| (1..=9999).contains(&d.year()))
}
