//! Unix platform bindings over `libc`.
//!
//! Readiness multiplexing uses `select(2)` so that the registry's three
//! readiness mirrors are plain `fd_set` values that can be copied out under
//! the lock and handed to the kernel without further translation.

use crate::error::SysError;

use libc::{
    EACCES, EADDRINUSE, EADDRNOTAVAIL, EAFNOSUPPORT, EAGAIN, EALREADY, EBADF, EBUSY, ECONNABORTED,
    ECONNREFUSED, ECONNRESET, EFAULT, EHOSTUNREACH, EINPROGRESS, EINTR, EINVAL, EISCONN, EMFILE,
    EMSGSIZE, ENETUNREACH, ENOBUFS, ENOMEM, ENOTCONN, ENOTSOCK, EOPNOTSUPP, EPERM,
    EPROTONOSUPPORT, ETIMEDOUT, EWOULDBLOCK, F_GETFL, F_SETFL, O_NONBLOCK, SO_ERROR, SOL_SOCKET,
    c_int, fd_set, sockaddr, sockaddr_in, sockaddr_in6, sockaddr_storage, socklen_t, timeval,
};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::time::Duration;
use std::{io, mem, ptr};

/// Native socket handle.
pub type RawSocket = c_int;

/// The handle value no valid socket ever has.
pub const INVALID_SOCKET: RawSocket = -1;

/// Number of descriptors an `fd_set` can represent.
pub const MAX_POLL_SIZE: usize = libc::FD_SETSIZE as usize;

pub(crate) const AF_UNSPEC: c_int = libc::AF_UNSPEC;
pub(crate) const AF_INET: c_int = libc::AF_INET;
pub(crate) const AF_INET6: c_int = libc::AF_INET6;
pub(crate) const SOCK_STREAM: c_int = libc::SOCK_STREAM;
pub(crate) const SOCK_DGRAM: c_int = libc::SOCK_DGRAM;
pub(crate) const SHUT_RD: c_int = libc::SHUT_RD;
pub(crate) const SHUT_WR: c_int = libc::SHUT_WR;
pub(crate) const SHUT_RDWR: c_int = libc::SHUT_RDWR;

/// `errno` → portable kind. Scanned in order; the first match wins in both directions.
pub(crate) static ERROR_TABLE: &[(c_int, SysError)] = &[
    (EWOULDBLOCK, SysError::WouldBlock),
    (EAGAIN, SysError::WouldBlock),
    (EINPROGRESS, SysError::InProgress),
    (EALREADY, SysError::Already),
    (EINTR, SysError::Interrupted),
    (ENOMEM, SysError::NoMemory),
    (ENOBUFS, SysError::NoMemory),
    (EMFILE, SysError::NoMemory),
    (EBUSY, SysError::Busy),
    (EINVAL, SysError::Invalid),
    (EFAULT, SysError::Invalid),
    (EBADF, SysError::BadDescriptor),
    (ENOTSOCK, SysError::NotSocket),
    (EACCES, SysError::PermissionDenied),
    (EPERM, SysError::PermissionDenied),
    (EADDRINUSE, SysError::AddrInUse),
    (EADDRNOTAVAIL, SysError::AddrNotAvailable),
    (ENETUNREACH, SysError::NetworkUnreachable),
    (EHOSTUNREACH, SysError::HostUnreachable),
    (ECONNREFUSED, SysError::ConnectionRefused),
    (ECONNRESET, SysError::ConnectionReset),
    (ECONNABORTED, SysError::ConnectionAborted),
    (ENOTCONN, SysError::NotConnected),
    (EISCONN, SysError::IsConnected),
    (ETIMEDOUT, SysError::TimedOut),
    (EMSGSIZE, SysError::MessageSize),
    (EOPNOTSUPP, SysError::NotSupported),
    (EAFNOSUPPORT, SysError::NotSupported),
    (EPROTONOSUPPORT, SysError::NotSupported),
];

/// Platform network start-up. Nothing to do on Unix.
pub(crate) fn init() -> io::Result<()> {
    Ok(())
}

/// Returns `true` if `sock` can be stored in an `fd_set`.
pub(crate) fn representable(sock: RawSocket) -> bool {
    sock >= 0 && (sock as usize) < MAX_POLL_SIZE
}

/// An `fd_set` together with the number of descriptors it holds.
#[derive(Clone, Copy)]
pub(crate) struct FdSet {
    set: fd_set,
    count: usize,
}

impl FdSet {
    pub(crate) fn new() -> Self {
        let mut set: fd_set = unsafe { mem::zeroed() };
        unsafe { libc::FD_ZERO(&mut set) };

        Self { set, count: 0 }
    }

    /// Adds `sock` to the set. Adding a member twice is a no-op.
    pub(crate) fn insert(&mut self, sock: RawSocket) {
        debug_assert!(representable(sock));

        if !self.contains(sock) {
            unsafe { libc::FD_SET(sock, &mut self.set) };
            self.count += 1;
        }
    }

    pub(crate) fn remove(&mut self, sock: RawSocket) {
        if self.contains(sock) {
            unsafe { libc::FD_CLR(sock, &mut self.set) };
            self.count -= 1;
        }
    }

    pub(crate) fn contains(&self, sock: RawSocket) -> bool {
        representable(sock) && unsafe { libc::FD_ISSET(sock, &self.set) }
    }

    pub(crate) fn len(&self) -> usize {
        self.count
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Pointer handed to `select`; null for an empty set.
    fn as_mut_ptr(&mut self) -> *mut fd_set {
        if self.is_empty() {
            ptr::null_mut()
        } else {
            &mut self.set
        }
    }

    /// Recounts members after the kernel rewrote the set in place.
    fn recount(&mut self, highest: RawSocket) {
        self.count = (0..=highest)
            .filter(|&fd| unsafe { libc::FD_ISSET(fd, &self.set) })
            .count();
    }
}

/// Converts a wait timeout into a `timeval` without losing sub-second precision.
pub(crate) fn to_timeval(timeout: Duration) -> timeval {
    timeval {
        tv_sec: timeout.as_secs().min(libc::time_t::MAX as u64) as libc::time_t,
        tv_usec: timeout.subsec_micros() as libc::suseconds_t,
    }
}

/// Blocks in `select(2)` over the three sets.
///
/// `highest` is the largest descriptor present in any set. On return each set
/// holds only its ready members. `None` blocks without a timeout.
pub(crate) fn select(
    read: &mut FdSet,
    write: &mut FdSet,
    except: &mut FdSet,
    highest: RawSocket,
    timeout: Option<Duration>,
) -> io::Result<usize> {
    let mut tv = timeout.map(to_timeval);
    let tv_ptr = tv
        .as_mut()
        .map_or(ptr::null_mut(), |tv| tv as *mut timeval);

    let rc = unsafe {
        libc::select(
            highest + 1,
            read.as_mut_ptr(),
            write.as_mut_ptr(),
            except.as_mut_ptr(),
            tv_ptr,
        )
    };

    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    for set in [read, write, except] {
        if !set.is_empty() {
            set.recount(highest);
        }
    }

    Ok(rc as usize)
}

/// Reads and clears the socket's pending error (`SO_ERROR`). `0` means none.
pub(crate) fn socket_error(sock: RawSocket) -> io::Result<i32> {
    let mut err: c_int = 0;
    let mut len = mem::size_of::<c_int>() as socklen_t;

    let rc = unsafe {
        libc::getsockopt(
            sock,
            SOL_SOCKET,
            SO_ERROR,
            &mut err as *mut _ as *mut _,
            &mut len,
        )
    };

    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(err)
    }
}

/// Converts a portable address into native storage and its length.
pub(crate) fn to_native(addr: &SocketAddr) -> (sockaddr_storage, socklen_t) {
    let mut storage: sockaddr_storage = unsafe { mem::zeroed() };

    match addr {
        SocketAddr::V4(v4) => {
            let sin = unsafe { &mut *(&mut storage as *mut _ as *mut sockaddr_in) };
            sin.sin_family = AF_INET as _;
            sin.sin_port = v4.port().to_be();
            sin.sin_addr.s_addr = u32::from(*v4.ip()).to_be();

            (storage, mem::size_of::<sockaddr_in>() as socklen_t)
        }

        SocketAddr::V6(v6) => {
            let sin6 = unsafe { &mut *(&mut storage as *mut _ as *mut sockaddr_in6) };
            sin6.sin6_family = AF_INET6 as _;
            sin6.sin6_port = v6.port().to_be();
            sin6.sin6_addr.s6_addr = v6.ip().octets();
            sin6.sin6_flowinfo = v6.flowinfo();
            sin6.sin6_scope_id = v6.scope_id();

            (storage, mem::size_of::<sockaddr_in6>() as socklen_t)
        }
    }
}

/// Converts native storage back into a portable address.
///
/// Returns `None` for families other than IPv4 and IPv6.
pub(crate) fn from_native(storage: &sockaddr_storage) -> Option<SocketAddr> {
    match storage.ss_family as c_int {
        AF_INET => {
            let sin = unsafe { &*(storage as *const _ as *const sockaddr_in) };
            let ip = Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr));

            Some(SocketAddr::V4(SocketAddrV4::new(
                ip,
                u16::from_be(sin.sin_port),
            )))
        }

        AF_INET6 => {
            let sin6 = unsafe { &*(storage as *const _ as *const sockaddr_in6) };

            Some(SocketAddr::V6(SocketAddrV6::new(
                Ipv6Addr::from(sin6.sin6_addr.s6_addr),
                u16::from_be(sin6.sin6_port),
                sin6.sin6_flowinfo,
                sin6.sin6_scope_id,
            )))
        }

        _ => None,
    }
}

fn cvt(rc: c_int) -> io::Result<c_int> {
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc)
    }
}

pub(crate) fn sys_socket(family: c_int, ty: c_int) -> io::Result<RawSocket> {
    cvt(unsafe { libc::socket(family, ty, 0) })
}

pub(crate) fn sys_close(sock: RawSocket) -> io::Result<()> {
    cvt(unsafe { libc::close(sock) }).map(drop)
}

pub(crate) fn sys_bind(sock: RawSocket, addr: &SocketAddr) -> io::Result<()> {
    let (storage, len) = to_native(addr);
    cvt(unsafe { libc::bind(sock, &storage as *const _ as *const sockaddr, len) }).map(drop)
}

pub(crate) fn sys_listen(sock: RawSocket, backlog: i32) -> io::Result<()> {
    cvt(unsafe { libc::listen(sock, backlog) }).map(drop)
}

pub(crate) fn sys_accept(sock: RawSocket) -> io::Result<(RawSocket, sockaddr_storage)> {
    let mut storage: sockaddr_storage = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<sockaddr_storage>() as socklen_t;

    let conn = cvt(unsafe { libc::accept(sock, &mut storage as *mut _ as *mut sockaddr, &mut len) })?;
    Ok((conn, storage))
}

/// Starts a connection. On a non-blocking socket this fails with `EINPROGRESS`.
pub(crate) fn sys_connect(sock: RawSocket, addr: &SocketAddr) -> io::Result<()> {
    let (storage, len) = to_native(addr);
    cvt(unsafe { libc::connect(sock, &storage as *const _ as *const sockaddr, len) }).map(drop)
}

pub(crate) fn sys_sockname(sock: RawSocket) -> io::Result<sockaddr_storage> {
    let mut storage: sockaddr_storage = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<sockaddr_storage>() as socklen_t;

    cvt(unsafe { libc::getsockname(sock, &mut storage as *mut _ as *mut sockaddr, &mut len) })?;
    Ok(storage)
}

pub(crate) fn sys_set_blocking(sock: RawSocket, blocking: bool) -> io::Result<()> {
    let flags = cvt(unsafe { libc::fcntl(sock, F_GETFL) })?;
    let flags = if blocking {
        flags & !O_NONBLOCK
    } else {
        flags | O_NONBLOCK
    };

    cvt(unsafe { libc::fcntl(sock, F_SETFL, flags) }).map(drop)
}

pub(crate) fn sys_shutdown(sock: RawSocket, how: c_int) -> io::Result<()> {
    cvt(unsafe { libc::shutdown(sock, how) }).map(drop)
}

#[cfg(any(target_os = "linux", target_os = "android"))]
const SEND_FLAGS: c_int = libc::MSG_NOSIGNAL;

#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEND_FLAGS: c_int = 0;

pub(crate) fn sys_send(sock: RawSocket, buffer: &[u8]) -> io::Result<usize> {
    let rc = unsafe { libc::send(sock, buffer.as_ptr() as *const _, buffer.len(), SEND_FLAGS) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc as usize)
    }
}

pub(crate) fn sys_recv(sock: RawSocket, buffer: &mut [u8]) -> io::Result<usize> {
    let rc = unsafe { libc::recv(sock, buffer.as_mut_ptr() as *mut _, buffer.len(), 0) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeval_keeps_microseconds() {
        let tv = to_timeval(Duration::from_millis(1500));
        assert_eq!(tv.tv_sec, 1);
        assert_eq!(tv.tv_usec, 500_000);

        let tv = to_timeval(Duration::ZERO);
        assert_eq!((tv.tv_sec, tv.tv_usec), (0, 0));

        let tv = to_timeval(Duration::from_micros(2_000_250));
        assert_eq!((tv.tv_sec, tv.tv_usec), (2, 250));
    }

    #[test]
    fn fd_set_counts_members() {
        let mut set = FdSet::new();
        assert!(set.is_empty());

        set.insert(3);
        set.insert(3);
        set.insert(7);
        assert_eq!(set.len(), 2);
        assert!(set.contains(3));
        assert!(!set.contains(4));

        set.remove(3);
        set.remove(3);
        assert_eq!(set.len(), 1);
        assert!(!set.contains(3));
        assert!(set.contains(7));
    }

    #[test]
    fn out_of_range_descriptors_are_not_representable() {
        assert!(!representable(INVALID_SOCKET));
        assert!(!representable(MAX_POLL_SIZE as RawSocket));
        assert!(representable(0));
        assert!(!FdSet::new().contains(MAX_POLL_SIZE as RawSocket));
    }

    #[test]
    fn address_round_trips_through_storage() {
        let v6 = SocketAddr::V6(SocketAddrV6::new(
            "fe80::1".parse().unwrap(),
            4000,
            7,
            3,
        ));
        let (storage, len) = to_native(&v6);

        assert_eq!(len as usize, mem::size_of::<sockaddr_in6>());
        assert_eq!(from_native(&storage), Some(v6));

        let mut unknown: sockaddr_storage = unsafe { mem::zeroed() };
        unknown.ss_family = libc::AF_UNIX as _;
        assert_eq!(from_native(&unknown), None);
    }
}
