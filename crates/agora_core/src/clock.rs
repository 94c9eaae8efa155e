//! Injected time sources.
//!
//! Every time-dependent rule in the ledger (vote windows, rolling vote-gain
//! buckets, cache TTL, profile age) reads time through [`Clock`] so tests can
//! pin and advance it without touching the wall clock.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Current instant in epoch milliseconds.
    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    millis: AtomicI64,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(at.timestamp_millis()),
        }
    }

    /// Convenience constructor from a UTC calendar date at midnight.
    ///
    /// Falls back to the unix epoch for out-of-range dates.
    pub fn at_date(year: i32, month: u32, day: u32) -> Self {
        let at = Utc
            .with_ymd_and_hms(year, month, day, 0, 0, 0)
            .single()
            .unwrap_or_default();
        Self::new(at)
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.millis.store(at.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.millis
            .fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        millis_to_datetime(self.millis.load(Ordering::SeqCst))
    }
}

/// Converts epoch milliseconds to a UTC instant, clamping invalid values to
/// the unix epoch.
pub fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{Clock, FixedClock};
    use chrono::{Datelike, Duration};

    #[test]
    fn fixed_clock_advances_by_requested_duration() {
        let clock = FixedClock::at_date(2024, 3, 31);
        clock.advance(Duration::days(1));
        let now = clock.now();
        assert_eq!((now.year(), now.month(), now.day()), (2024, 4, 1));
    }
}
