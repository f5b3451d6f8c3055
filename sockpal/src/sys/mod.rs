//! Platform bindings.
//!
//! This module exposes one uniform set of native primitives over the
//! platform-specific socket APIs:
//! - a socket handle type and its invalid sentinel,
//! - a fixed-size native readiness set ([`FdSet`]),
//! - the blocking `select` call and the pending-error (`SO_ERROR`) query,
//! - the native error code table,
//! - address translation and thin socket call wrappers.
//!
//! The concrete implementation is selected at compile time
//! depending on the target operating system.

#[cfg(unix)]
pub(crate) mod unix;

#[cfg(unix)]
pub(crate) use unix as platform;

#[cfg(windows)]
pub(crate) mod windows;

#[cfg(windows)]
pub(crate) use windows as platform;

pub use platform::{INVALID_SOCKET, MAX_POLL_SIZE, RawSocket};

pub(crate) use platform::*;
