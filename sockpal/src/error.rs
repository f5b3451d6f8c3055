//! Portable error taxonomy.
//!
//! Every fallible operation in this crate returns [`Result`]. Native failures
//! are never exposed as raw `errno` / `WSAGetLastError()` values: they are
//! translated into a [`SysError`] through the active platform's table and
//! wrapped in [`Error::System`].

use crate::sys;

use std::io;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the poll context and the socket wrappers.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Malformed input, an invalid socket handle, or an invalid (torn down) context.
    #[error("invalid argument")]
    InvalidArgument,

    /// The poll context already holds its maximum number of sockets.
    #[error("poll context is full ({capacity} sockets)")]
    CapacityExceeded { capacity: usize },

    /// The socket is not registered with the poll context.
    #[error("socket not found")]
    NotFound,

    /// The socket is already registered with the poll context.
    #[error("socket already registered")]
    AlreadyExists,

    /// `wait` was called while no sockets are registered.
    #[error("no sockets to poll")]
    NoSockets,

    /// The wait deadline elapsed with nothing ready.
    #[error("timed out")]
    TimedOut,

    /// A native call failed.
    #[error("system error: {0}")]
    System(SysError),

    /// The platform lacks the capability.
    #[error("not implemented on this platform")]
    NotImplemented,
}

/// Portable kind of a native error code.
///
/// Produced from a raw OS code with [`SysError::from_raw_os_error`]; codes
/// with no portable equivalent are kept verbatim in [`SysError::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SysError {
    WouldBlock,
    InProgress,
    Already,
    Interrupted,
    NoMemory,
    Busy,
    Invalid,
    BadDescriptor,
    NotSocket,
    PermissionDenied,
    AddrInUse,
    AddrNotAvailable,
    NetworkUnreachable,
    HostUnreachable,
    ConnectionRefused,
    ConnectionReset,
    ConnectionAborted,
    NotConnected,
    IsConnected,
    TimedOut,
    MessageSize,
    NotSupported,
    Other(i32),
}

impl SysError {
    /// Translates a native error code of the current platform.
    pub fn from_raw_os_error(code: i32) -> Self {
        sys::ERROR_TABLE
            .iter()
            .find(|(native, _)| *native == code)
            .map(|&(_, kind)| kind)
            .unwrap_or(SysError::Other(code))
    }

    /// Returns the native code this kind maps back to on the current platform.
    pub fn raw_os_error(self) -> i32 {
        if let SysError::Other(code) = self {
            return code;
        }

        sys::ERROR_TABLE
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|&(native, _)| native)
            .unwrap_or(0)
    }
}

impl std::fmt::Display for SysError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SysError::Other(code) => write!(f, "os error {code}"),
            kind => write!(f, "{kind:?}"),
        }
    }
}

impl From<SysError> for Error {
    fn from(kind: SysError) -> Self {
        Error::System(kind)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::System(SysError::from_raw_os_error(err.raw_os_error().unwrap_or(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_known_codes() {
        for &(native, kind) in sys::ERROR_TABLE {
            assert_eq!(SysError::from_raw_os_error(native), kind);
        }
    }

    #[test]
    fn unknown_code_is_kept() {
        assert_eq!(SysError::from_raw_os_error(-77), SysError::Other(-77));
        assert_eq!(SysError::Other(-77).raw_os_error(), -77);
    }

    #[test]
    fn reverse_lookup_uses_first_table_entry() {
        let refused = SysError::ConnectionRefused.raw_os_error();
        assert_ne!(refused, 0);
        assert_eq!(SysError::from_raw_os_error(refused), SysError::ConnectionRefused);
    }

    #[test]
    fn io_error_is_translated() {
        let err: Error = io::Error::from_raw_os_error(SysError::NotConnected.raw_os_error()).into();
        assert_eq!(err, Error::System(SysError::NotConnected));

        let err: Error = io::Error::new(io::ErrorKind::Other, "no code").into();
        assert_eq!(err, Error::System(SysError::Other(0)));
    }
}
