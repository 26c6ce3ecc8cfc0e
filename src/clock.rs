//! Wall-clock abstraction.
//!
//! Dates ("today"), breaker cooldowns, throttle intervals, dedup windows and
//! in-memory TTLs all read the injected [`Clock`] so they can be driven
//! deterministically in tests.

use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDate, NaiveDateTime, TimeZone};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Local>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

pub type SharedClock = Arc<dyn Clock>;

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Build a clock from a local wall-clock time such as `2025-08-15 09:00:00`.
    ///
    /// Returns `None` when the time does not exist in the local timezone.
    pub fn at_local(naive: NaiveDateTime) -> Option<Self> {
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(Self::new)
    }

    pub fn set(&self, now: DateTime<Local>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let delta = ChronoDuration::from_std(by).unwrap_or(ChronoDuration::MAX);
        let mut now = self.now.lock();
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock()
    }
}

/// Elapsed wall time since `earlier`, clamped at zero when the clock went backwards.
pub fn elapsed_since(clock: &dyn Clock, earlier: DateTime<Local>) -> Duration {
    (clock.now() - earlier).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_manual_clock_advances() {
        let start = NaiveDate::from_ymd_opt(2025, 8, 15)
            .unwrap()
            .and_hms_opt(23, 59, 0)
            .unwrap();
        let clock = ManualClock::at_local(start).unwrap();
        let before = clock.now();

        clock.advance(Duration::from_secs(120));

        assert_eq!(elapsed_since(&clock, before), Duration::from_secs(120));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 8, 16).unwrap());
    }

    #[test]
    fn test_elapsed_clamps_negative() {
        let clock = ManualClock::new(Local::now());
        let future = clock.now() + ChronoDuration::seconds(30);
        assert_eq!(elapsed_since(&clock, future), Duration::ZERO);
    }
}
