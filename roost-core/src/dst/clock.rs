//! `SimClock` - Simulated Time
//!
//! TigerStyle: time only moves when a test moves it. Storage models stamp
//! records with it and backups derive their file names from it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::constants::{DST_TIME_ADVANCE_MS_MAX, TIME_MS_PER_SEC};

/// A simulated clock for deterministic testing.
///
/// Cloning shares the underlying time, so a clock handed to several stores
/// advances for all of them at once.
#[derive(Debug, Clone)]
pub struct SimClock {
    current_ms: Arc<AtomicU64>,
}

impl SimClock {
    /// Create a new clock starting at the Unix epoch.
    ///
    /// # Example
    /// ```
    /// use roost_core::dst::SimClock;
    /// let clock = SimClock::new();
    /// assert_eq!(clock.now_ms(), 0);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::at_ms(0)
    }

    /// Create a clock starting at the given millisecond timestamp.
    #[must_use]
    pub fn at_ms(start_ms: u64) -> Self {
        Self {
            current_ms: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// Create a clock starting at the given `DateTime`.
    ///
    /// # Panics
    /// Panics if `dt` is before the Unix epoch.
    #[must_use]
    pub fn at_datetime(dt: DateTime<Utc>) -> Self {
        let ms = u64::try_from(dt.timestamp_millis()).expect("datetime must not precede the epoch");
        Self::at_ms(ms)
    }

    /// Get current time in milliseconds.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.current_ms.load(Ordering::SeqCst)
    }

    /// Get current time in seconds (truncated).
    #[must_use]
    pub fn now_secs(&self) -> u64 {
        self.now_ms() / TIME_MS_PER_SEC
    }

    /// Get current time as `DateTime<Utc>`.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        i64::try_from(self.now_ms())
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Advance time by the given milliseconds and return the new time.
    ///
    /// # Panics
    /// Panics if ms exceeds `DST_TIME_ADVANCE_MS_MAX`.
    pub fn advance_ms(&self, ms: u64) -> u64 {
        // Precondition
        assert!(
            ms <= DST_TIME_ADVANCE_MS_MAX,
            "advance_ms({ms}) exceeds max ({DST_TIME_ADVANCE_MS_MAX})"
        );

        let old_time = self.current_ms.fetch_add(ms, Ordering::SeqCst);
        let new_time = old_time.saturating_add(ms);

        // Postcondition
        assert!(new_time >= old_time, "time must not go backwards");
        new_time
    }

    /// Advance time by whole seconds.
    pub fn advance_secs(&self, secs: u64) -> u64 {
        self.advance_ms(secs * TIME_MS_PER_SEC)
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}
