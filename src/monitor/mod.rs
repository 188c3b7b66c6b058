//! Interval-driven sampling engines.
//!
//! [`SystemMonitor`] samples whole-host metrics; [`ProcessMonitor`] is the
//! same loop specialized to a filtered process list. Each engine runs its
//! loop on one dedicated worker thread that exclusively owns the sink and
//! appends to a shared buffer; `stop()` is the only cross-thread signal.

mod process;
mod system;

pub use process::{ProcessMatcher, ProcessMonitor, ProcessReport, ProcessSnapshot, ProcessSummary};
pub use system::{MonitorReport, SystemMonitor};

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Consecutive provider failures tolerated before the loop gives up.
pub(crate) const MAX_PROVIDER_FAILURES: u32 = 5;

/// Bound on how long `stop()` waits for the worker to exit.
pub(crate) const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Configured intervals are clamped to [1ms, 1 day]; out-of-range values
/// (including non-finite ones) must not panic `Duration` construction.
pub(crate) fn tick_interval(interval_secs: f64) -> Duration {
    let secs = if interval_secs.is_finite() {
        interval_secs.clamp(0.001, 86_400.0)
    } else {
        86_400.0
    };
    Duration::from_secs_f64(secs)
}

/// Lifecycle of one monitoring session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Stopped,
}

/// One-shot cancellation flag with an interruptible timed wait, so a
/// sleeping worker reacts to `stop()` within the tick rather than after
/// a full interval.
pub(crate) struct StopEvent {
    flag: Mutex<bool>,
    cond: Condvar,
}

impl StopEvent {
    pub(crate) fn new() -> Self {
        Self {
            flag: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn set(&self) {
        *self.flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.cond.notify_all();
    }

    pub(crate) fn is_set(&self) -> bool {
        *self.flag.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until the flag is set or `timeout` elapses. Returns true if
    /// the flag was set.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut set = self.flag.lock().unwrap_or_else(PoisonError::into_inner);
        while !*set {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .cond
                .wait_timeout(set, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            set = guard;
        }
        true
    }
}
