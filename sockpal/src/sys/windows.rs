//! Windows platform bindings over `windows-sys`.
//!
//! Mirrors the Unix layer with identical function names and semantics.
//! WinSock's `fd_set` is an array of handles rather than a bitmap, so the
//! readiness-set limit is the array length and not a descriptor value.

use crate::error::SysError;

use std::io;
use std::mem;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::ptr;
use std::sync::OnceLock;
use std::time::Duration;

use windows_sys::Win32::Networking::WinSock::{
    self, FD_SET, FIONBIO, SO_ERROR, SOCKADDR, SOCKADDR_IN, SOCKADDR_IN6, SOCKADDR_STORAGE,
    SOCKET, SOCKET_ERROR, SOL_SOCKET, TIMEVAL, WSADATA, WSAEACCES, WSAEADDRINUSE,
    WSAEADDRNOTAVAIL, WSAEAFNOSUPPORT, WSAEALREADY, WSAEBADF, WSAECONNABORTED, WSAECONNREFUSED,
    WSAECONNRESET, WSAEFAULT, WSAEHOSTUNREACH, WSAEINPROGRESS, WSAEINTR, WSAEINVAL, WSAEISCONN,
    WSAEMFILE, WSAEMSGSIZE, WSAENETUNREACH, WSAENOBUFS, WSAENOTCONN, WSAENOTSOCK, WSAEOPNOTSUPP,
    WSAEPROTONOSUPPORT, WSAETIMEDOUT, WSAEWOULDBLOCK, WSAStartup,
};

/// Native socket handle.
pub type RawSocket = SOCKET;

/// The handle value no valid socket ever has.
pub const INVALID_SOCKET: RawSocket = WinSock::INVALID_SOCKET;

/// Number of handles a WinSock `fd_set` can hold (`FD_SETSIZE`).
pub const MAX_POLL_SIZE: usize = 64;

pub(crate) const AF_UNSPEC: i32 = WinSock::AF_UNSPEC as i32;
pub(crate) const AF_INET: i32 = WinSock::AF_INET as i32;
pub(crate) const AF_INET6: i32 = WinSock::AF_INET6 as i32;
pub(crate) const SOCK_STREAM: i32 = WinSock::SOCK_STREAM as i32;
pub(crate) const SOCK_DGRAM: i32 = WinSock::SOCK_DGRAM as i32;
pub(crate) const SHUT_RD: i32 = WinSock::SD_RECEIVE as i32;
pub(crate) const SHUT_WR: i32 = WinSock::SD_SEND as i32;
pub(crate) const SHUT_RDWR: i32 = WinSock::SD_BOTH as i32;

/// `WSAGetLastError()` → portable kind. Scanned in order; the first match wins in both directions.
pub(crate) static ERROR_TABLE: &[(i32, SysError)] = &[
    (WSAEWOULDBLOCK, SysError::WouldBlock),
    (WSAEINPROGRESS, SysError::InProgress),
    (WSAEALREADY, SysError::Already),
    (WSAEINTR, SysError::Interrupted),
    (WSAENOBUFS, SysError::NoMemory),
    (WSAEMFILE, SysError::NoMemory),
    (WSAEINVAL, SysError::Invalid),
    (WSAEFAULT, SysError::Invalid),
    (WSAEBADF, SysError::BadDescriptor),
    (WSAENOTSOCK, SysError::NotSocket),
    (WSAEACCES, SysError::PermissionDenied),
    (WSAEADDRINUSE, SysError::AddrInUse),
    (WSAEADDRNOTAVAIL, SysError::AddrNotAvailable),
    (WSAENETUNREACH, SysError::NetworkUnreachable),
    (WSAEHOSTUNREACH, SysError::HostUnreachable),
    (WSAECONNREFUSED, SysError::ConnectionRefused),
    (WSAECONNRESET, SysError::ConnectionReset),
    (WSAECONNABORTED, SysError::ConnectionAborted),
    (WSAENOTCONN, SysError::NotConnected),
    (WSAEISCONN, SysError::IsConnected),
    (WSAETIMEDOUT, SysError::TimedOut),
    (WSAEMSGSIZE, SysError::MessageSize),
    (WSAEOPNOTSUPP, SysError::NotSupported),
    (WSAEAFNOSUPPORT, SysError::NotSupported),
    (WSAEPROTONOSUPPORT, SysError::NotSupported),
];

#[inline]
const fn makeword(low: u8, high: u8) -> u16 {
    ((high as u16) << 8) | (low as u16)
}

/// Result of the one-time `WSAStartup` call.
static WINSOCK_INIT: OnceLock<i32> = OnceLock::new();

/// Initializes Winsock 2.2 once per process.
pub(crate) fn init() -> io::Result<()> {
    let rc = *WINSOCK_INIT.get_or_init(|| unsafe {
        let mut data: WSADATA = mem::zeroed();
        WSAStartup(makeword(2, 2), &mut data)
    });

    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::from_raw_os_error(rc))
    }
}

/// Any valid handle fits in a WinSock `fd_set`; only the count is bounded.
pub(crate) fn representable(sock: RawSocket) -> bool {
    sock != INVALID_SOCKET
}

/// A WinSock `fd_set`. The member count lives in the structure itself.
#[derive(Clone, Copy)]
pub(crate) struct FdSet {
    set: FD_SET,
}

impl FdSet {
    pub(crate) fn new() -> Self {
        Self {
            set: unsafe { mem::zeroed() },
        }
    }

    fn members(&self) -> &[SOCKET] {
        &self.set.fd_array[..self.set.fd_count as usize]
    }

    /// Adds `sock` to the set. Adding a member twice, or past capacity, is a no-op.
    pub(crate) fn insert(&mut self, sock: RawSocket) {
        let count = self.set.fd_count as usize;

        if !self.contains(sock) && count < MAX_POLL_SIZE {
            self.set.fd_array[count] = sock;
            self.set.fd_count += 1;
        }
    }

    pub(crate) fn remove(&mut self, sock: RawSocket) {
        let count = self.set.fd_count as usize;

        if let Some(pos) = self.members().iter().position(|&s| s == sock) {
            self.set.fd_array.copy_within(pos + 1..count, pos);
            self.set.fd_count -= 1;
        }
    }

    pub(crate) fn contains(&self, sock: RawSocket) -> bool {
        self.members().contains(&sock)
    }

    pub(crate) fn len(&self) -> usize {
        self.set.fd_count as usize
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.set.fd_count == 0
    }

    /// Pointer handed to `select`; null for an empty set.
    fn as_mut_ptr(&mut self) -> *mut FD_SET {
        if self.is_empty() {
            ptr::null_mut()
        } else {
            &mut self.set
        }
    }
}

/// Converts a wait timeout into a `TIMEVAL` without losing sub-second precision.
pub(crate) fn to_timeval(timeout: Duration) -> TIMEVAL {
    TIMEVAL {
        tv_sec: timeout.as_secs().min(i32::MAX as u64) as i32,
        tv_usec: timeout.subsec_micros() as i32,
    }
}

/// Blocks in `select` over the three sets.
///
/// `highest` is ignored by WinSock. On return each set holds only its ready
/// members. `None` blocks without a timeout.
pub(crate) fn select(
    read: &mut FdSet,
    write: &mut FdSet,
    except: &mut FdSet,
    _highest: RawSocket,
    timeout: Option<Duration>,
) -> io::Result<usize> {
    let tv = timeout.map(to_timeval);
    let tv_ptr = tv.as_ref().map_or(ptr::null(), |tv| tv as *const TIMEVAL);

    let rc = unsafe {
        WinSock::select(
            0,
            read.as_mut_ptr(),
            write.as_mut_ptr(),
            except.as_mut_ptr(),
            tv_ptr,
        )
    };

    if rc == SOCKET_ERROR {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc as usize)
    }
}

/// Reads and clears the socket's pending error (`SO_ERROR`). `0` means none.
pub(crate) fn socket_error(sock: RawSocket) -> io::Result<i32> {
    let mut err: i32 = 0;
    let mut len = mem::size_of::<i32>() as i32;

    let rc = unsafe {
        WinSock::getsockopt(
            sock,
            SOL_SOCKET,
            SO_ERROR,
            &mut err as *mut _ as *mut u8,
            &mut len,
        )
    };

    if rc != 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(err)
    }
}

/// Converts a portable address into native storage and its length.
pub(crate) fn to_native(addr: &SocketAddr) -> (SOCKADDR_STORAGE, i32) {
    let mut storage: SOCKADDR_STORAGE = unsafe { mem::zeroed() };

    match addr {
        SocketAddr::V4(v4) => {
            let sin = unsafe { &mut *(&mut storage as *mut _ as *mut SOCKADDR_IN) };
            sin.sin_family = WinSock::AF_INET;
            sin.sin_port = v4.port().to_be();
            sin.sin_addr.S_un.S_addr = u32::from(*v4.ip()).to_be();

            (storage, mem::size_of::<SOCKADDR_IN>() as i32)
        }

        SocketAddr::V6(v6) => {
            let sin6 = unsafe { &mut *(&mut storage as *mut _ as *mut SOCKADDR_IN6) };
            sin6.sin6_family = WinSock::AF_INET6;
            sin6.sin6_port = v6.port().to_be();
            sin6.sin6_addr.u.Byte = v6.ip().octets();
            sin6.sin6_flowinfo = v6.flowinfo();
            sin6.Anonymous.sin6_scope_id = v6.scope_id();

            (storage, mem::size_of::<SOCKADDR_IN6>() as i32)
        }
    }
}

/// Converts native storage back into a portable address.
///
/// Returns `None` for families other than IPv4 and IPv6.
pub(crate) fn from_native(storage: &SOCKADDR_STORAGE) -> Option<SocketAddr> {
    match storage.ss_family {
        WinSock::AF_INET => unsafe {
            let sin = &*(storage as *const _ as *const SOCKADDR_IN);
            let ip = Ipv4Addr::from(u32::from_be(sin.sin_addr.S_un.S_addr));

            Some(SocketAddr::V4(SocketAddrV4::new(
                ip,
                u16::from_be(sin.sin_port),
            )))
        },

        WinSock::AF_INET6 => unsafe {
            let sin6 = &*(storage as *const _ as *const SOCKADDR_IN6);

            Some(SocketAddr::V6(SocketAddrV6::new(
                Ipv6Addr::from(sin6.sin6_addr.u.Byte),
                u16::from_be(sin6.sin6_port),
                sin6.sin6_flowinfo,
                sin6.Anonymous.sin6_scope_id,
            )))
        },

        _ => None,
    }
}

fn cvt(rc: i32) -> io::Result<i32> {
    if rc == SOCKET_ERROR {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc)
    }
}

pub(crate) fn sys_socket(family: i32, ty: i32) -> io::Result<RawSocket> {
    let sock = unsafe { WinSock::socket(family, ty, 0) };
    if sock == INVALID_SOCKET {
        Err(io::Error::last_os_error())
    } else {
        Ok(sock)
    }
}

pub(crate) fn sys_close(sock: RawSocket) -> io::Result<()> {
    cvt(unsafe { WinSock::closesocket(sock) }).map(drop)
}

pub(crate) fn sys_bind(sock: RawSocket, addr: &SocketAddr) -> io::Result<()> {
    let (storage, len) = to_native(addr);
    cvt(unsafe { WinSock::bind(sock, &storage as *const _ as *const SOCKADDR, len) }).map(drop)
}

pub(crate) fn sys_listen(sock: RawSocket, backlog: i32) -> io::Result<()> {
    cvt(unsafe { WinSock::listen(sock, backlog) }).map(drop)
}

pub(crate) fn sys_accept(sock: RawSocket) -> io::Result<(RawSocket, SOCKADDR_STORAGE)> {
    let mut storage: SOCKADDR_STORAGE = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<SOCKADDR_STORAGE>() as i32;

    let conn = unsafe { WinSock::accept(sock, &mut storage as *mut _ as *mut SOCKADDR, &mut len) };
    if conn == INVALID_SOCKET {
        Err(io::Error::last_os_error())
    } else {
        Ok((conn, storage))
    }
}

/// Starts a connection. On a non-blocking socket this fails with `WSAEWOULDBLOCK`.
pub(crate) fn sys_connect(sock: RawSocket, addr: &SocketAddr) -> io::Result<()> {
    let (storage, len) = to_native(addr);
    cvt(unsafe { WinSock::connect(sock, &storage as *const _ as *const SOCKADDR, len) }).map(drop)
}

pub(crate) fn sys_sockname(sock: RawSocket) -> io::Result<SOCKADDR_STORAGE> {
    let mut storage: SOCKADDR_STORAGE = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<SOCKADDR_STORAGE>() as i32;

    cvt(unsafe { WinSock::getsockname(sock, &mut storage as *mut _ as *mut SOCKADDR, &mut len) })?;
    Ok(storage)
}

pub(crate) fn sys_set_blocking(sock: RawSocket, blocking: bool) -> io::Result<()> {
    let mut nonblocking: u32 = if blocking { 0 } else { 1 };
    cvt(unsafe { WinSock::ioctlsocket(sock, FIONBIO, &mut nonblocking) }).map(drop)
}

pub(crate) fn sys_shutdown(sock: RawSocket, how: i32) -> io::Result<()> {
    cvt(unsafe { WinSock::shutdown(sock, how) }).map(drop)
}

pub(crate) fn sys_send(sock: RawSocket, buffer: &[u8]) -> io::Result<usize> {
    let len = buffer.len().min(i32::MAX as usize) as i32;
    cvt(unsafe { WinSock::send(sock, buffer.as_ptr(), len, 0) }).map(|n| n as usize)
}

pub(crate) fn sys_recv(sock: RawSocket, buffer: &mut [u8]) -> io::Result<usize> {
    let len = buffer.len().min(i32::MAX as usize) as i32;
    cvt(unsafe { WinSock::recv(sock, buffer.as_mut_ptr(), len, 0) }).map(|n| n as usize)
}
