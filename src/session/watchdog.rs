//! Stream liveness watchdog
//!
//! The watchdog is a periodic check against a "last sample received"
//! timestamp. It does not own a timer; the loop driving the session calls
//! [`Watchdog::poll`] as often as it likes and the watchdog decides whether
//! a check is due. A check runs at most once per interval, and missed
//! intervals are skipped rather than replayed in a burst.
//!
//! Being armed is the same thing as having a scheduled next check, so there
//! can only ever be one active periodic check.

/// Result of polling the watchdog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogStatus {
    /// Not armed
    Disarmed,
    /// Armed, next check not reached yet
    NotDue,
    /// A check ran and the stream is alive
    Healthy { age_ms: i64 },
    /// A check ran and found the stream stale; the watchdog disarmed itself
    Stale { age_ms: i64 },
}

/// Periodic staleness check
#[derive(Debug, Clone)]
pub struct Watchdog {
    interval_ms: i64,
    threshold_ms: i64,
    last_sample_at: Option<i64>,
    next_check_at: Option<i64>,
    checks_run: u64,
}

impl Watchdog {
    /// Create a disarmed watchdog
    pub fn new(interval_ms: u64, threshold_ms: u64) -> Self {
        Self {
            interval_ms: i64::try_from(interval_ms).unwrap_or(i64::MAX).max(1),
            threshold_ms: i64::try_from(threshold_ms).unwrap_or(i64::MAX),
            last_sample_at: None,
            next_check_at: None,
            checks_run: 0,
        }
    }

    /// Start the periodic check; returns `false` if it was already armed
    ///
    /// Arming stamps `now` as the last sample time so the stream gets a full
    /// threshold before it can be declared stale.
    pub fn arm(&mut self, now_ms: i64) -> bool {
        if self.is_armed() {
            return false;
        }
        self.last_sample_at = Some(now_ms);
        self.next_check_at = Some(now_ms.saturating_add(self.interval_ms));
        true
    }

    /// Cancel the periodic check; safe to call when already disarmed
    pub fn disarm(&mut self) -> bool {
        self.next_check_at.take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.next_check_at.is_some()
    }

    /// Record a successful sample
    pub fn feed(&mut self, at_ms: i64) {
        self.last_sample_at = Some(at_ms);
    }

    pub fn last_sample_at(&self) -> Option<i64> {
        self.last_sample_at
    }

    /// Number of checks that actually ran
    pub fn checks_run(&self) -> u64 {
        self.checks_run
    }

    pub fn threshold_ms(&self) -> i64 {
        self.threshold_ms
    }

    /// Run the check if one is due
    pub fn poll(&mut self, now_ms: i64) -> WatchdogStatus {
        let Some(next) = self.next_check_at else {
            return WatchdogStatus::Disarmed;
        };
        if now_ms < next {
            return WatchdogStatus::NotDue;
        }

        let missed = now_ms.saturating_sub(next) / self.interval_ms;
        let step = missed.saturating_add(1).saturating_mul(self.interval_ms);
        self.next_check_at = Some(next.saturating_add(step));
        self.checks_run += 1;

        let age_ms = now_ms.saturating_sub(self.last_sample_at.unwrap_or(now_ms));
        if age_ms > self.threshold_ms {
            self.next_check_at = None;
            WatchdogStatus::Stale { age_ms }
        } else {
            WatchdogStatus::Healthy { age_ms }
        }
    }
}
