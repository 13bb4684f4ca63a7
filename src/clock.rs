use std::sync::Mutex;

use chrono::{Duration, FixedOffset, Local, NaiveDateTime, Timelike, Utc};

use crate::config::TimeZoneConfig;
use crate::error::{ReminderBotError, Result};

/// Source of wall-clock time in the zone reminders are scheduled in.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    HostLocal,
    Fixed(FixedOffset),
}

impl Zone {
    pub fn from_config(config: &TimeZoneConfig) -> Result<Self> {
        match config.utc_offset_minutes {
            None => Ok(Zone::HostLocal),
            Some(minutes) => minutes
                .checked_mul(60)
                .and_then(FixedOffset::east_opt)
                .map(Zone::Fixed)
                .ok_or_else(|| {
                    ReminderBotError::Config(format!("invalid utc offset: {minutes} minutes"))
                }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    zone: Zone,
}

impl SystemClock {
    pub fn new(zone: Zone) -> Self {
        Self { zone }
    }

    pub fn host_local() -> Self {
        Self::new(Zone::HostLocal)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        match self.zone {
            Zone::HostLocal => Local::now().naive_local(),
            Zone::Fixed(offset) => Utc::now().with_timezone(&offset).naive_local(),
        }
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        match self.now.lock() {
            Ok(mut guard) => *guard = now,
            Err(poisoned) => *poisoned.into_inner() = now,
        }
    }

    pub fn advance(&self, by: Duration) {
        let next = self.now() + by;
        self.set(next);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Drops seconds and sub-second precision.
pub fn truncate_to_minute(value: NaiveDateTime) -> NaiveDateTime {
    value
        .with_second(0)
        .and_then(|v| v.with_nanosecond(0))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .and_then(|d| d.and_hms_milli_opt(h, m, s, 750))
            .expect("valid datetime")
    }

    #[test]
    fn truncate_zeroes_seconds_and_nanos() {
        let truncated = truncate_to_minute(at(9, 41, 37));
        assert_eq!(truncated.second(), 0);
        assert_eq!(truncated.nanosecond(), 0);
        assert_eq!(truncated.minute(), 41);
    }

    #[test]
    fn fixed_clock_advances() {
        let clock = FixedClock::new(at(10, 0, 0));
        clock.advance(Duration::minutes(90));
        assert_eq!(clock.now().hour(), 11);
        assert_eq!(clock.now().minute(), 30);
    }

    #[test]
    fn zone_from_config() {
        let zone = Zone::from_config(&TimeZoneConfig {
            utc_offset_minutes: Some(-300),
        })
        .expect("valid offset");
        assert_eq!(
            zone,
            Zone::Fixed(FixedOffset::west_opt(5 * 3600).expect("offset"))
        );
        assert_eq!(
            Zone::from_config(&TimeZoneConfig::default()).expect("local"),
            Zone::HostLocal
        );
        assert!(Zone::from_config(&TimeZoneConfig {
            utc_offset_minutes: Some(24 * 60)
        })
        .is_err());
    }

    #[test]
    fn extreme_offsets_are_errors_not_overflows() {
        for minutes in [i32::MIN, i32::MAX] {
            let result = Zone::from_config(&TimeZoneConfig {
                utc_offset_minutes: Some(minutes),
            });
            assert!(matches!(result, Err(ReminderBotError::Config(_))));
        }
    }

    #[test]
    fn fixed_zone_clock_tracks_utc_offset() {
        let offset = FixedOffset::east_opt(3 * 3600).expect("offset");
        let clock = SystemClock::new(Zone::Fixed(offset));
        let utc = Utc::now().naive_utc();
        let drift = clock.now() - utc - Duration::hours(3);
        assert!(drift.num_seconds().abs() < 5);
    }
}
