//! Turns the time a user typed into the moment a reminder fires.
//!
//! Two shapes are understood:
//!
//! - `HH:MM` for today; a time that is not strictly in the future means
//!   the same time tomorrow.
//! - `DD.MM HH:MM` for an explicit day in the current year.
//!
//! Results always have zero seconds and are in the same zone as `now`.

use std::sync::OnceLock;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

use crate::clock::truncate_to_minute;
use crate::error::{ReminderBotError, Result};

pub const FORMAT_HINT: &str = "HH:MM or DD.MM HH:MM";

fn time_only_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(\d{2}):(\d{2})$").ok())
        .as_ref()
}

fn dated_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(\d{1,2})\.(\d{1,2})\s+(\d{2}):(\d{2})$").ok())
        .as_ref()
}

pub fn resolve(now: NaiveDateTime, input: &str) -> Result<NaiveDateTime> {
    let input = input.trim();

    if let Some(caps) = time_only_pattern().and_then(|p| p.captures(input)) {
        let time = parse_time(input, &caps[1], &caps[2])?;
        let mut scheduled = now.date().and_time(time);
        if scheduled <= now {
            scheduled += Duration::days(1);
        }
        return Ok(truncate_to_minute(scheduled));
    }

    if let Some(caps) = dated_pattern().and_then(|p| p.captures(input)) {
        let day = parse_field(input, &caps[1])?;
        let month = parse_field(input, &caps[2])?;
        let time = parse_time(input, &caps[3], &caps[4])?;
        let date = NaiveDate::from_ymd_opt(now.year(), month, day)
            .ok_or_else(|| invalid(input, "no such calendar date"))?;
        return Ok(truncate_to_minute(date.and_time(time)));
    }

    Err(invalid(input, &format!("expected {FORMAT_HINT}")))
}

fn parse_time(input: &str, hour: &str, minute: &str) -> Result<NaiveTime> {
    let hour = parse_field(input, hour)?;
    let minute = parse_field(input, minute)?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| invalid(input, "no such time of day"))
}

fn parse_field(input: &str, digits: &str) -> Result<u32> {
    digits
        .parse()
        .map_err(|_| invalid(input, "number out of range"))
}

fn invalid(input: &str, reason: &str) -> ReminderBotError {
    ReminderBotError::Parse(format!("{input:?}: {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .and_then(|date| date.and_hms_opt(h, mi, s))
            .expect("valid datetime")
    }

    #[test]
    fn future_time_today_stays_today() {
        let now = dt(2026, 5, 10, 8, 15, 42);
        assert_eq!(resolve(now, "18:45").unwrap(), dt(2026, 5, 10, 18, 45, 0));
    }

    #[test]
    fn past_time_rolls_to_tomorrow() {
        let now = dt(2026, 5, 10, 20, 0, 0);
        let naive_today = dt(2026, 5, 10, 9, 30, 0);
        let resolved = resolve(now, "09:30").unwrap();
        assert_eq!(resolved - naive_today, Duration::hours(24));
    }

    #[test]
    fn current_minute_counts_as_past() {
        let now = dt(2026, 5, 10, 9, 30, 0);
        assert_eq!(resolve(now, "09:30").unwrap(), dt(2026, 5, 11, 9, 30, 0));

        let now = dt(2026, 5, 10, 9, 30, 20);
        assert_eq!(resolve(now, "09:30").unwrap(), dt(2026, 5, 11, 9, 30, 0));
    }

    #[test]
    fn rollover_crosses_month_and_year() {
        let now = dt(2026, 12, 31, 23, 50, 0);
        assert_eq!(resolve(now, "00:05").unwrap(), dt(2027, 1, 1, 0, 5, 0));
    }

    #[test]
    fn dated_input_uses_current_year() {
        for now in [dt(2026, 1, 1, 0, 0, 0), dt(2031, 11, 30, 23, 59, 59)] {
            let resolved = resolve(now, "25.08 09:30").unwrap();
            assert_eq!(resolved.year(), now.year());
            assert_eq!((resolved.month(), resolved.day()), (8, 25));
            assert_eq!((resolved.hour(), resolved.minute()), (9, 30));
        }
    }

    #[test]
    fn dated_input_accepts_single_digit_day_and_month() {
        let now = dt(2026, 1, 1, 0, 0, 0);
        assert_eq!(resolve(now, "5.8 07:00").unwrap(), dt(2026, 8, 5, 7, 0, 0));
    }

    #[test]
    fn leap_day_depends_on_current_year() {
        assert!(resolve(dt(2028, 1, 1, 0, 0, 0), "29.02 10:00").is_ok());
        assert!(resolve(dt(2026, 1, 1, 0, 0, 0), "29.02 10:00").is_err());
    }

    #[test]
    fn rejects_malformed_and_invalid_values() {
        let now = dt(2026, 5, 10, 8, 0, 0);
        for input in [
            "25:00",
            "abc",
            "31.02 10:00",
            "12:60",
            "9:30",
            "",
            "18:45:00",
            "32.01 10:00",
            "10.13 10:00",
            "10.05",
        ] {
            assert!(
                matches!(resolve(now, input), Err(ReminderBotError::Parse(_))),
                "expected parse error for {input:?}"
            );
        }
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let now = dt(2026, 5, 10, 8, 0, 0);
        assert_eq!(resolve(now, "  18:45 \n").unwrap(), dt(2026, 5, 10, 18, 45, 0));
    }

    #[test]
    fn results_have_zero_seconds() {
        let now = dt(2026, 5, 10, 8, 0, 59);
        for input in ["08:00", "23:59", "01.06 12:34"] {
            let resolved = resolve(now, input).unwrap();
            assert_eq!(resolved.second(), 0);
            assert_eq!(resolved.nanosecond(), 0);
        }
    }
}
