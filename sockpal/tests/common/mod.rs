#![allow(dead_code)]

use sockpal::RawSocket;

use std::net::{SocketAddr, TcpListener, TcpStream};

#[cfg(unix)]
pub fn raw<S: std::os::fd::AsRawFd>(sock: &S) -> RawSocket {
    sock.as_raw_fd()
}

#[cfg(windows)]
pub fn raw<S: std::os::windows::io::AsRawSocket>(sock: &S) -> RawSocket {
    sock.as_raw_socket() as RawSocket
}

pub fn init_logger() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .is_test(true)
        .try_init();
}

/// Returns `(client, server)` ends of a loopback TCP connection.
pub fn connected_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind listener");
    let addr = listener.local_addr().expect("Failed to get local address");

    let client = TcpStream::connect(addr).expect("Failed to connect to listener");
    let (server, _) = listener.accept().expect("Failed to accept connection");

    (client, server)
}

/// A listening socket: never writable, readable only when a peer connects.
pub fn idle_listener() -> TcpListener {
    TcpListener::bind("127.0.0.1:0").expect("Failed to bind listener")
}

/// A loopback address nothing is listening on.
pub fn closed_port() -> SocketAddr {
    let listener = idle_listener();
    listener.local_addr().expect("Failed to get local address")
}
