//! Thin portable socket calls.
//!
//! These wrap the native socket API one-to-one and translate failures into
//! [`Error`]. They exist mostly for what `std::net` cannot express, such as a
//! non-blocking connect whose completion is then observed through a
//! [`PollContext`](crate::PollContext) with [`PollEvents::CONNECT`](crate::PollEvents::CONNECT).
//!
//! Sockets returned here are plain handles: closing them is up to the caller.

use crate::error::{Error, Result};
use crate::sys::{self, INVALID_SOCKET, RawSocket};

use std::net::{Shutdown, SocketAddr};

/// Portable address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Unspec,
    Inet,
    Inet6,
}

impl AddressFamily {
    pub(crate) fn to_native(self) -> i32 {
        match self {
            AddressFamily::Unspec => sys::AF_UNSPEC,
            AddressFamily::Inet => sys::AF_INET,
            AddressFamily::Inet6 => sys::AF_INET6,
        }
    }

    /// Maps a native family back, without assuming numeric equality.
    pub fn from_native(family: i32) -> Option<Self> {
        match family {
            f if f == sys::AF_UNSPEC => Some(AddressFamily::Unspec),
            f if f == sys::AF_INET => Some(AddressFamily::Inet),
            f if f == sys::AF_INET6 => Some(AddressFamily::Inet6),
            _ => None,
        }
    }

    /// The family matching an address.
    pub fn of(addr: &SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(_) => AddressFamily::Inet,
            SocketAddr::V6(_) => AddressFamily::Inet6,
        }
    }
}

/// Portable socket type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketType {
    Stream,
    Datagram,
}

impl SocketType {
    pub(crate) fn to_native(self) -> i32 {
        match self {
            SocketType::Stream => sys::SOCK_STREAM,
            SocketType::Datagram => sys::SOCK_DGRAM,
        }
    }

    pub fn from_native(ty: i32) -> Option<Self> {
        match ty {
            t if t == sys::SOCK_STREAM => Some(SocketType::Stream),
            t if t == sys::SOCK_DGRAM => Some(SocketType::Datagram),
            _ => None,
        }
    }
}

fn check(sock: RawSocket) -> Result<()> {
    if sock == INVALID_SOCKET {
        Err(Error::InvalidArgument)
    } else {
        Ok(())
    }
}

/// Creates a socket. `AddressFamily::Unspec` is rejected.
pub fn socket(family: AddressFamily, ty: SocketType) -> Result<RawSocket> {
    if family == AddressFamily::Unspec {
        return Err(Error::InvalidArgument);
    }

    sys::init()?;
    Ok(sys::sys_socket(family.to_native(), ty.to_native())?)
}

pub fn close(sock: RawSocket) -> Result<()> {
    check(sock)?;
    Ok(sys::sys_close(sock)?)
}

pub fn bind(sock: RawSocket, addr: &SocketAddr) -> Result<()> {
    check(sock)?;
    Ok(sys::sys_bind(sock, addr)?)
}

pub fn listen(sock: RawSocket, backlog: i32) -> Result<()> {
    check(sock)?;
    Ok(sys::sys_listen(sock, backlog)?)
}

/// Accepts a pending connection, returning the new socket and the peer address.
pub fn accept(sock: RawSocket) -> Result<(RawSocket, SocketAddr)> {
    check(sock)?;
    let (conn, storage) = sys::sys_accept(sock)?;

    match sys::from_native(&storage) {
        Some(addr) => Ok((conn, addr)),
        None => {
            let _ = sys::sys_close(conn);
            Err(Error::InvalidArgument)
        }
    }
}

/// Connects to `addr`.
///
/// On a non-blocking socket the call returns immediately with
/// `SysError::InProgress` (Unix) or `SysError::WouldBlock` (Windows); watch
/// the socket for `PollEvents::CONNECT` to learn the outcome.
pub fn connect(sock: RawSocket, addr: &SocketAddr) -> Result<()> {
    check(sock)?;
    Ok(sys::sys_connect(sock, addr)?)
}

pub fn local_addr(sock: RawSocket) -> Result<SocketAddr> {
    check(sock)?;
    let storage = sys::sys_sockname(sock)?;
    sys::from_native(&storage).ok_or(Error::InvalidArgument)
}

pub fn set_blocking(sock: RawSocket, blocking: bool) -> Result<()> {
    check(sock)?;
    Ok(sys::sys_set_blocking(sock, blocking)?)
}

pub fn shutdown(sock: RawSocket, how: Shutdown) -> Result<()> {
    check(sock)?;
    let how = match how {
        Shutdown::Read => sys::SHUT_RD,
        Shutdown::Write => sys::SHUT_WR,
        Shutdown::Both => sys::SHUT_RDWR,
    };

    Ok(sys::sys_shutdown(sock, how)?)
}

/// Sends bytes, returning how many were written.
pub fn send(sock: RawSocket, buffer: &[u8]) -> Result<usize> {
    check(sock)?;
    Ok(sys::sys_send(sock, buffer)?)
}

/// Receives bytes, returning how many were read. `0` means the peer closed.
pub fn recv(sock: RawSocket, buffer: &mut [u8]) -> Result<usize> {
    check(sock)?;
    Ok(sys::sys_recv(sock, buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_table_round_trips() {
        for family in [AddressFamily::Unspec, AddressFamily::Inet, AddressFamily::Inet6] {
            assert_eq!(AddressFamily::from_native(family.to_native()), Some(family));
        }
        assert_eq!(AddressFamily::from_native(-1), None);
    }

    #[test]
    fn type_table_round_trips() {
        for ty in [SocketType::Stream, SocketType::Datagram] {
            assert_eq!(SocketType::from_native(ty.to_native()), Some(ty));
        }
        assert_eq!(SocketType::from_native(-1), None);
    }

    #[test]
    fn invalid_handle_is_rejected() {
        assert_eq!(close(INVALID_SOCKET), Err(Error::InvalidArgument));
        assert_eq!(set_blocking(INVALID_SOCKET, false), Err(Error::InvalidArgument));
        assert_eq!(
            socket(AddressFamily::Unspec, SocketType::Stream),
            Err(Error::InvalidArgument)
        );
    }

    #[test]
    fn bound_socket_reports_its_address() {
        let sock = socket(AddressFamily::Inet, SocketType::Datagram).unwrap();
        bind(sock, &"127.0.0.1:0".parse().unwrap()).unwrap();

        let addr = local_addr(sock).unwrap();
        assert_eq!(AddressFamily::of(&addr), AddressFamily::Inet);
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);

        close(sock).unwrap();
    }
}
