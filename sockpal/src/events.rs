use crate::error::SysError;
use crate::sys::RawSocket;

use bitflags::bitflags;

bitflags! {
    /// Readiness conditions a socket can be watched for, and reported with.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PollEvents: u32 {
        /// The socket is readable.
        const IN = 1 << 0;
        /// The socket is writable.
        const OUT = 1 << 1;
        /// Out-of-band data is readable.
        const OOB = 1 << 2;
        /// An asynchronous connect completed, successfully or not.
        const CONNECT = 1 << 3;
        /// The socket has a pending error. Reported whether watched or not.
        const ERR = 1 << 4;
    }
}

impl PollEvents {
    /// Conditions that may be passed to `add` / `modify`.
    pub const VALID_INPUT: PollEvents = PollEvents::IN
        .union(PollEvents::OUT)
        .union(PollEvents::OOB)
        .union(PollEvents::CONNECT);

    /// Returns `true` if this mask watches at least one valid input condition.
    pub fn is_valid_input(self) -> bool {
        self.intersects(Self::VALID_INPUT)
    }
}

/// A readiness report for one watched socket, produced by a single `wait` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event<T> {
    /// The socket that became ready.
    pub socket: RawSocket,

    /// Resolved conditions: a subset of the watched mask, plus `ERR`.
    pub events: PollEvents,

    /// The socket's pending error, set exactly when `events` contains `ERR`.
    pub err: Option<SysError>,

    /// The tag the socket was registered with.
    pub user_data: T,
}
