//! Attention model and timer primitives
//!
//! Nothing here owns a clock. Callers pass `now` in and poll, so the same
//! code runs under a host event loop and under deterministic tests.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Two states of the attention model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityState {
    Active,
    Idle,
}

/// Active/Idle machine driven by the recency of activity signals
#[derive(Debug, Clone)]
pub struct ActivityMonitor {
    state: ActivityState,
    last_activity: DateTime<Utc>,
    window: Duration,
}

impl ActivityMonitor {
    /// Starts Active, as if activity was just observed
    pub fn new(window_ms: i64, now: DateTime<Utc>) -> Self {
        Self {
            state: ActivityState::Active,
            last_activity: now,
            window: Duration::milliseconds(window_ms),
        }
    }

    pub fn state(&self) -> ActivityState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ActivityState::Active
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// Record an activity signal. Returns true if this woke the monitor.
    pub fn signal(&mut self, now: DateTime<Utc>) -> bool {
        if now > self.last_activity {
            self.last_activity = now;
        }
        let woke = self.state == ActivityState::Idle;
        self.state = ActivityState::Active;
        woke
    }

    /// Periodic check. Returns true if the monitor just went idle.
    pub fn check(&mut self, now: DateTime<Utc>) -> bool {
        if self.state == ActivityState::Active && now - self.last_activity >= self.window {
            self.state = ActivityState::Idle;
            return true;
        }
        false
    }
}

/// Lets through at most one call per window
#[derive(Debug, Clone)]
pub struct Throttle {
    window: Duration,
    last: Option<DateTime<Utc>>,
}

impl Throttle {
    pub fn new(window_ms: i64) -> Self {
        Self {
            window: Duration::milliseconds(window_ms),
            last: None,
        }
    }

    pub fn allow(&mut self, now: DateTime<Utc>) -> bool {
        match self.last {
            Some(last) if now - last < self.window => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// A cancellable recurring deadline
#[derive(Debug, Clone)]
pub struct PeriodicTimer {
    interval: Duration,
    next_due: Option<DateTime<Utc>>,
}

impl PeriodicTimer {
    /// Created stopped
    pub fn new(interval_ms: i64) -> Self {
        Self {
            interval: Duration::milliseconds(interval_ms),
            next_due: None,
        }
    }

    pub fn start(&mut self, now: DateTime<Utc>) {
        self.next_due = Some(now + self.interval);
    }

    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.next_due
    }

    /// True once per elapsed deadline. Missed periods are not replayed.
    pub fn poll(&mut self, now: DateTime<Utc>) -> bool {
        match self.next_due {
            Some(due) if now >= due => {
                self.next_due = Some(now + self.interval);
                true
            }
            _ => false,
        }
    }
}
