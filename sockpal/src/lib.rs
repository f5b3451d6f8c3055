//! # sockpal
//!
//! **sockpal** is a portable socket polling layer. It exposes one readiness
//! API that behaves the same on every supported platform, built on the
//! descriptor-set `select` primitive every socket stack provides.
//!
//! The heart of the crate is [`PollContext`]:
//!
//! - a **thread-safe registry** of watched sockets, each with a
//!   [`PollEvents`] mask and an opaque user tag,
//! - a **readiness multiplexer** that copies the registry's native readiness
//!   sets under its lock and blocks without holding it,
//! - a **deterministic decoder** that turns one `select` result into exactly
//!   one [`Event`], including the socket's pending error.
//!
//! Around it sit the platform pieces the core needs: [`Error`] / [`SysError`]
//! translation of native error codes, thin [`socket`] calls with address
//! translation, and a monotonic [`timer`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sockpal::{PollContext, PollEvents, Error};
//! use std::time::Duration;
//!
//! let poll = PollContext::new()?;
//! poll.add(sock_a, PollEvents::IN, 1)?;
//! poll.add(sock_b, PollEvents::OUT, 2)?;
//!
//! loop {
//!     match poll.wait(Some(Duration::from_millis(100))) {
//!         Ok(event) if event.events.contains(PollEvents::IN) => read_from(event.socket),
//!         Ok(event) => write_to(event.socket),
//!         Err(Error::TimedOut) => continue,
//!         Err(e) => return Err(e),
//!     }
//! }
//! ```
//!
//! ## Limits
//!
//! A context holds at most [`MAX_POLL_SIZE`] sockets (the native `fd_set`
//! limit). `select` scales linearly with the number of sockets; this crate
//! targets correctness for a bounded socket count, not edge-triggered
//! high-volume event loops.

#[macro_use]
extern crate log;

mod error;
mod events;
mod poll;
mod sys;

pub mod socket;
pub mod timer;

pub use error::{Error, Result, SysError};
pub use events::{Event, PollEvents};
pub use poll::{PollContext, PollContextBuilder, WAIT_FOREVER};
pub use sys::{INVALID_SOCKET, MAX_POLL_SIZE, RawSocket};
