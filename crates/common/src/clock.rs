//! Clock abstraction for time operations.
//!
//! Services never read the system clock directly; they receive a
//! [`Clock`] so tests can pin and advance time manually.

use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Injectable time source.
pub trait Clock: Send + Sync {
    /// Get the current UTC datetime.
    fn now(&self) -> DateTime<Utc>;

    /// Get the current time as a Unix timestamp.
    fn now_unix(&self) -> i64 {
        self.now().timestamp()
    }
}

/// Real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fake clock for tests. Time only moves when told to.
#[derive(Debug)]
pub struct FakeClock {
    current: Mutex<DateTime<Utc>>,
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeClock {
    /// Create a fake clock at the default test instant (2024-01-15 12:00 UTC).
    #[must_use]
    pub fn new() -> Self {
        #[allow(clippy::unwrap_used)]
        let initial = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        Self::at(initial)
    }

    /// Create a fake clock at a specific instant.
    #[must_use]
    pub fn at(initial: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(initial),
        }
    }

    /// Set the current time.
    pub fn set(&self, instant: DateTime<Utc>) {
        #[allow(clippy::unwrap_used)]
        let mut current = self.current.lock().unwrap();
        *current = instant;
    }

    /// Advance time by the given number of seconds.
    pub fn advance_seconds(&self, seconds: i64) {
        #[allow(clippy::unwrap_used)]
        let mut current = self.current.lock().unwrap();
        *current += Duration::seconds(seconds);
    }

    /// Advance time by the given number of minutes.
    pub fn advance_minutes(&self, minutes: i64) {
        self.advance_seconds(minutes * 60);
    }

    /// Advance time by the given number of hours.
    pub fn advance_hours(&self, hours: i64) {
        self.advance_seconds(hours * 3600);
    }

    /// Advance time by the given number of days.
    pub fn advance_days(&self, days: i64) {
        self.advance_seconds(days * 86_400);
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        #[allow(clippy::unwrap_used)]
        let current = self.current.lock().unwrap();
        *current
    }
}
