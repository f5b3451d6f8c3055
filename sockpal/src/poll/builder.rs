use super::PollContext;

use crate::error::Result;
use crate::sys::MAX_POLL_SIZE;

/// Builder for configuring and creating a [`PollContext`].
///
/// Currently it supports lowering the maximum number of sockets a context
/// accepts below the native readiness-set limit ([`MAX_POLL_SIZE`]).
///
/// # Examples
///
/// ```rust,ignore
/// let poll: PollContext<u32> = PollContextBuilder::new()
///     .capacity(16)
///     .build()?;
/// ```
pub struct PollContextBuilder {
    /// Maximum number of registered sockets.
    capacity: usize,
}

impl PollContextBuilder {
    /// Creates a builder whose capacity is the native limit.
    pub fn new() -> Self {
        Self {
            capacity: MAX_POLL_SIZE,
        }
    }

    /// Sets the maximum number of sockets the context accepts.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0` or `n > MAX_POLL_SIZE`.
    pub fn capacity(mut self, n: usize) -> Self {
        assert!(n > 0, "capacity must be > 0");
        assert!(
            n <= MAX_POLL_SIZE,
            "capacity must be <= {MAX_POLL_SIZE} on this platform"
        );

        self.capacity = n;
        self
    }

    /// Builds the context.
    ///
    /// This performs the platform's network start-up (Winsock on Windows)
    /// and fails with the translated system error if it cannot.
    pub fn build<T: Clone>(self) -> Result<PollContext<T>> {
        PollContext::with_capacity(self.capacity)
    }
}

impl Default for PollContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
