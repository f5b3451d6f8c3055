//! Monotonic time helpers.
//!
//! [`getms`] is a wrapping millisecond counter for callers that want a cheap
//! tick value; [`Timer`] tracks an interval so repeated
//! [`PollContext::wait`](crate::PollContext::wait) calls can share one
//! overall budget.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Milliseconds elapsed on a monotonic clock since a process-local epoch.
///
/// The value wraps at `u32::MAX` (about 49.7 days); compare ticks with
/// `wrapping_sub`.
pub fn getms() -> u32 {
    let epoch = *EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_millis() as u32
}

/// A countdown over a fixed interval.
///
/// # Examples
///
/// ```rust,ignore
/// let timer = Timer::new(Duration::from_secs(5));
/// while !timer.is_expired() {
///     match poll.wait(Some(timer.remaining())) {
///         Ok(event) => handle(event),
///         Err(Error::TimedOut) => break,
///         Err(e) => return Err(e),
///     }
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
    interval: Duration,
}

impl Timer {
    /// Starts a timer that expires after `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            start: Instant::now(),
            interval,
        }
    }

    /// Restarts the countdown with the same interval.
    pub fn reset(&mut self) {
        self.start = Instant::now();
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// A zero interval is expired immediately.
    pub fn is_expired(&self) -> bool {
        self.elapsed() >= self.interval
    }

    /// Time left before expiry, or zero once expired.
    pub fn remaining(&self) -> Duration {
        self.interval.saturating_sub(self.elapsed())
    }
}
