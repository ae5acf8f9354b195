// Time sources and calendar helpers.
//
// Every "now" or "today" decision in the core reads an injected [`Clock`],
// so expiry and quota rules can be exercised deterministically.

use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Timelike, Utc};

use crate::options::CalendarOptions;

pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CalendarOptions {
    /// The configured fixed offset. Out-of-range values fall back to UTC.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_seconds).unwrap_or_else(|| Utc.fix())
    }

    pub fn local_time(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        at.with_timezone(&self.offset())
    }

    /// Calendar date of `at` in the configured offset.
    pub fn date_of(&self, at: DateTime<Utc>) -> NaiveDate {
        self.local_time(at).date_naive()
    }

    /// Hour of day (0..24) of `at` in the configured offset.
    pub fn hour_of(&self, at: DateTime<Utc>) -> u32 {
        self.local_time(at).hour()
    }

    /// The instant local midnight begins on `date`.
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        let local_midnight = date.and_time(NaiveTime::MIN);
        (local_midnight - Duration::seconds(i64::from(self.offset().local_minus_utc()))).and_utc()
    }

    /// Today's calendar date according to `clock`.
    pub fn today(&self, clock: &dyn Clock) -> NaiveDate {
        self.date_of(clock.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_moves_only_when_told() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(Duration::minutes(6));
        assert_eq!(clock.now(), start + Duration::minutes(6));
        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_date_of_respects_offset() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 23, 30, 0).unwrap();
        let utc = CalendarOptions { utc_offset_seconds: 0 };
        let lagos = CalendarOptions { utc_offset_seconds: 3600 };
        assert_eq!(utc.date_of(at), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(lagos.date_of(at), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(lagos.hour_of(at), 0);
    }

    #[test]
    fn test_start_of_day_in_offset() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let lagos = CalendarOptions { utc_offset_seconds: 3600 };
        assert_eq!(lagos.start_of_day(date), Utc.with_ymd_and_hms(2024, 1, 1, 23, 0, 0).unwrap());
        let utc = CalendarOptions::default();
        assert_eq!(utc.start_of_day(date), Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_invalid_offset_falls_back_to_utc() {
        let cal = CalendarOptions { utc_offset_seconds: 90_000 };
        assert_eq!(cal.offset().local_minus_utc(), 0);
    }
}
