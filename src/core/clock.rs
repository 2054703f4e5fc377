//! Clock implementations

use super::traits::Clock;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::sync::{PoisonError, RwLock};

/// Wall clock in UTC
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a chosen instant, movable by hand
///
/// Used by the `--as-of` option and by tests that need cards to expire.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    /// Pin the clock to midnight UTC of `date`
    pub fn on(date: NaiveDate) -> Self {
        Self {
            now: RwLock::new(date.and_time(chrono::NaiveTime::MIN).and_utc()),
        }
    }

    pub fn set_today(&self, date: NaiveDate) {
        let mut now = self.now.write().unwrap_or_else(PoisonError::into_inner);
        *now = date.and_time(chrono::NaiveTime::MIN).and_utc();
    }

    pub fn advance_days(&self, days: i64) {
        let mut now = self.now.write().unwrap_or_else(PoisonError::into_inner);
        *now += Duration::days(days);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(PoisonError::into_inner)
    }
}
