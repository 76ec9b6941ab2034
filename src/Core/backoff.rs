// Polling back-off for the channel workers. The outer side has no wake
// primitive, so waiting is sleep-based with an exponential interval.

use std::thread;
use std::time::Duration;

/// Shortest sleep between signal polls.
pub const BACKOFF_START: Duration = Duration::from_micros(1);

/// Longest sleep between signal polls; bounds idle wake latency.
pub const BACKOFF_CAP: Duration = Duration::from_millis(1);

/// Exponential back-off sleeper: 1 us doubling up to the 1 ms cap.
pub struct Backoff {
    current: Duration,
}

impl Backoff {
    pub fn new() -> Self {
        Self {
            current: BACKOFF_START,
        }
    }

    /// Sleep for the current interval, then double it (capped).
    pub fn snooze(&mut self) {
        thread::sleep(self.current);
        self.current = (self.current * 2).min(BACKOFF_CAP);
    }

    /// Drop back to the shortest interval after progress.
    pub fn reset(&mut self) {
        self.current = BACKOFF_START;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}
