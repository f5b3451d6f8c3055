//! Socket readiness polling.
//!
//! A [`PollContext`] owns a registry of watched sockets and the three native
//! readiness sets mirrored from it. Sockets are added, modified and removed
//! from any thread; [`PollContext::wait`] blocks in the native multiplexer
//! and reports **one** ready socket per call.
//!
//! ## Locking
//!
//! One mutex guards the registry and its mirrors. `add`, `modify`, `remove`
//! and `deinit` hold it for their whole duration. `wait` holds it only to
//! copy the mirrors before blocking and again to decode the result, so
//! registry changes are never held up by a blocked wait. The copy can go
//! stale while the wait is blocked: sockets removed in the meantime are
//! never reported, sockets added in the meantime are only seen by the next
//! wait.
//!
//! ## Fairness
//!
//! When several sockets are ready at once, the one with the lowest handle is
//! reported. Readiness persists in the OS until it is serviced, so no event
//! is lost, but a busy low-numbered socket can starve higher-numbered ones.

mod builder;
mod decode;
mod registry;

pub use builder::PollContextBuilder;

use registry::Registry;

use crate::error::{Error, Result};
use crate::events::{Event, PollEvents};
use crate::sys::{self, RawSocket};

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Timeout value for [`PollContext::wait_ms`] that blocks until a socket is ready.
pub const WAIT_FOREVER: i32 = -1;

/// A set of sockets polled together.
///
/// `T` is an opaque tag stored with each socket and copied into every
/// [`Event`] reported for it. Share the context between threads with an
/// `Arc`; every method takes `&self`.
///
/// # Examples
///
/// ```rust,ignore
/// use sockpal::{PollContext, PollEvents};
/// use std::net::TcpListener;
/// use std::os::fd::AsRawFd;
/// use std::time::Duration;
///
/// let listener = TcpListener::bind("127.0.0.1:0")?;
/// let poll = PollContext::new()?;
/// poll.add(listener.as_raw_fd(), PollEvents::IN, "listener")?;
///
/// let event = poll.wait(Some(Duration::from_secs(1)))?;
/// assert_eq!(event.user_data, "listener");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct PollContext<T> {
    /// `None` once the context has been torn down.
    inner: Mutex<Option<Registry<T>>>,
}

impl<T: Clone> PollContext<T> {
    /// Creates a context with the default capacity.
    ///
    /// Equivalent to `PollContextBuilder::new().build()`.
    pub fn new() -> Result<Self> {
        PollContextBuilder::new().build()
    }

    pub(crate) fn with_capacity(capacity: usize) -> Result<Self> {
        sys::init()?;
        debug!("poll context created (capacity {capacity})");

        Ok(Self {
            inner: Mutex::new(Some(Registry::new(capacity))),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Option<Registry<T>>> {
        // Every registry update is all-or-nothing, so a poisoned registry is still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tears the context down, dropping every registered socket.
    ///
    /// Afterwards `add`, `modify` and `wait` fail with
    /// [`Error::InvalidArgument`] and `remove` does nothing. Calling
    /// `deinit` again is a no-op.
    pub fn deinit(&self) {
        if let Some(mut registry) = self.lock().take() {
            registry.clear();
            debug!("poll context torn down");
        }
    }

    /// Returns `false` once [`deinit`](Self::deinit) has been called.
    pub fn is_valid(&self) -> bool {
        self.lock().is_some()
    }

    /// Number of registered sockets.
    pub fn len(&self) -> usize {
        self.lock().as_ref().map_or(0, Registry::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of sockets this context accepts.
    pub fn capacity(&self) -> usize {
        self.lock().as_ref().map_or(0, Registry::capacity)
    }

    /// Starts watching `socket` for `events`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if the socket is the invalid sentinel or
    ///   cannot be represented in a native readiness set, if `events` holds
    ///   none of `IN | OUT | OOB | CONNECT`, or if the context was torn down.
    /// - [`Error::CapacityExceeded`] if the context is full.
    /// - [`Error::AlreadyExists`] if the socket is already registered.
    pub fn add(&self, socket: RawSocket, events: PollEvents, user_data: T) -> Result<()> {
        let mut guard = self.lock();
        let registry = guard.as_mut().ok_or(Error::InvalidArgument)?;

        registry.add(socket, events, user_data)?;
        trace!("poll add: socket {socket:?} events {events:?}");
        Ok(())
    }

    /// Replaces the watched events and tag of a registered socket.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the socket is not registered; otherwise the
    /// same argument checks as [`add`](Self::add).
    pub fn modify(&self, socket: RawSocket, events: PollEvents, user_data: T) -> Result<()> {
        let mut guard = self.lock();
        let registry = guard.as_mut().ok_or(Error::InvalidArgument)?;

        registry.modify(socket, events, user_data)?;
        trace!("poll modify: socket {socket:?} events {events:?}");
        Ok(())
    }

    /// Stops watching `socket`. Unknown sockets are ignored.
    pub fn remove(&self, socket: RawSocket) {
        if let Some(registry) = self.lock().as_mut() {
            if registry.remove(socket) {
                trace!("poll remove: socket {socket:?}");
            }
        }
    }

    /// Waits for one registered socket to become ready.
    ///
    /// `None` blocks until something is ready, `Some(Duration::ZERO)` polls
    /// and returns immediately.
    ///
    /// # Errors
    ///
    /// - [`Error::NoSockets`] if nothing is registered.
    /// - [`Error::TimedOut`] if the timeout elapsed with nothing ready.
    /// - [`Error::System`] if the native wait, or the pending-error query of
    ///   the selected socket, failed. Nothing is retried.
    /// - [`Error::InvalidArgument`] if the context was torn down.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<Event<T>> {
        let mut snapshot = {
            let guard = self.lock();
            guard.as_ref().ok_or(Error::InvalidArgument)?.snapshot()
        };

        if snapshot.sets.is_empty() {
            return Err(Error::NoSockets);
        }

        let sets = &mut snapshot.sets;
        let count = sys::select(
            &mut sets.read,
            &mut sets.write,
            &mut sets.except,
            snapshot.highest,
            timeout,
        )
        .map_err(|e| {
            debug!("poll wait failed: {e}");
            Error::from(e)
        })?;

        if count == 0 {
            return Err(Error::TimedOut);
        }

        let guard = self.lock();
        let registry = guard.as_ref().ok_or(Error::InvalidArgument)?;

        let event = decode::decode(registry.entries(), &snapshot.sets, sys::socket_error)?;
        debug!(
            "poll wait: socket {:?} events {:?} err {:?}",
            event.socket, event.events, event.err
        );
        Ok(event)
    }

    /// [`wait`](Self::wait) with a millisecond timeout.
    ///
    /// `0` polls, [`WAIT_FOREVER`] blocks indefinitely. Any other negative
    /// value is rejected with [`Error::InvalidArgument`].
    pub fn wait_ms(&self, timeout_ms: i32) -> Result<Event<T>> {
        self.wait(timeout_from_ms(timeout_ms)?)
    }
}

fn timeout_from_ms(timeout_ms: i32) -> Result<Option<Duration>> {
    match timeout_ms {
        WAIT_FOREVER => Ok(None),
        ms if ms < 0 => Err(Error::InvalidArgument),
        ms => Ok(Some(Duration::from_millis(ms as u64))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millisecond_timeouts() {
        assert_eq!(timeout_from_ms(WAIT_FOREVER), Ok(None));
        assert_eq!(timeout_from_ms(0), Ok(Some(Duration::ZERO)));
        assert_eq!(timeout_from_ms(1500), Ok(Some(Duration::from_millis(1500))));
        assert_eq!(timeout_from_ms(-2), Err(Error::InvalidArgument));
    }

    #[test]
    fn empty_context_has_no_sockets() {
        let poll = PollContext::<u8>::new().unwrap();
        assert_eq!(poll.wait(None), Err(Error::NoSockets));
        assert_eq!(poll.wait_ms(0), Err(Error::NoSockets));
    }

    #[test]
    fn torn_down_context_rejects_operations() {
        let poll = PollContext::new().unwrap();
        poll.add(3, PollEvents::IN, 7u8).unwrap();

        poll.deinit();
        poll.deinit();

        assert!(!poll.is_valid());
        assert_eq!(poll.len(), 0);
        assert_eq!(poll.add(4, PollEvents::IN, 1), Err(Error::InvalidArgument));
        assert_eq!(poll.modify(3, PollEvents::IN, 1), Err(Error::InvalidArgument));
        assert_eq!(poll.wait_ms(0), Err(Error::InvalidArgument));
        poll.remove(3);
    }
}
