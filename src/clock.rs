// Time source used for backoff waits and request pacing.

use chrono::Utc;
use std::thread;
use std::time::Duration;

pub trait Clock {
    /// Current Unix time in seconds.
    fn now(&self) -> i64;

    /// Block the current thread for `duration`.
    fn sleep(&mut self, duration: Duration);
}

/// Wall clock with real sleeps.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }

    fn sleep(&mut self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}
