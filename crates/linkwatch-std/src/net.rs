//! Listening sockets on top of `std::net`.
//!
//! Works on Linux and on ESP-IDF std targets (lwIP sockets).

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream};

use tracing::debug;

use linkwatch_core::{BindError, SocketFactory};

/// Binds non-blocking TCP listeners on a fixed local address.
#[derive(Debug, Clone, Copy)]
pub struct TcpSocketFactory {
    bind_ip: IpAddr,
}

impl TcpSocketFactory {
    pub fn new(bind_ip: IpAddr) -> Self {
        Self { bind_ip }
    }

    /// Listen on all interfaces.
    pub fn any() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }

    /// Listen on loopback only.
    pub fn loopback() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }
}

impl Default for TcpSocketFactory {
    fn default() -> Self {
        Self::any()
    }
}

impl SocketFactory for TcpSocketFactory {
    type Socket = TcpListenSocket;

    fn bind(&mut self, port: u16) -> Result<TcpListenSocket, BindError> {
        let to_bind_error = |e: io::Error| BindError {
            port,
            message: e.to_string(),
        };

        let listener = TcpListener::bind((self.bind_ip, port)).map_err(to_bind_error)?;
        listener.set_nonblocking(true).map_err(to_bind_error)?;
        let local_addr = listener.local_addr().map_err(to_bind_error)?;

        debug!(%local_addr, "listening socket bound");
        Ok(TcpListenSocket {
            listener,
            local_addr,
        })
    }
}

/// A bound, non-blocking TCP listener. Closed on drop.
#[derive(Debug)]
pub struct TcpListenSocket {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpListenSocket {
    /// Address actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept one pending connection without waiting.
    pub fn try_accept(&self) -> io::Result<Option<(TcpStream, SocketAddr)>> {
        match self.listener.accept() {
            Ok(pair) => Ok(Some(pair)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Drop for TcpListenSocket {
    fn drop(&mut self) {
        debug!(local_addr = %self.local_addr, "closing listening socket");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_ephemeral_and_accept() {
        let mut factory = TcpSocketFactory::loopback();
        let socket = factory.bind(0).unwrap();
        assert_ne!(socket.local_addr().port(), 0);

        assert!(socket.try_accept().unwrap().is_none());

        let _client = TcpStream::connect(socket.local_addr()).unwrap();
        let mut accepted = None;
        for _ in 0..100 {
            if let Some(pair) = socket.try_accept().unwrap() {
                accepted = Some(pair);
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(accepted.is_some());
    }

    #[test]
    fn test_bind_conflict_reports_port() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let err = TcpSocketFactory::loopback().bind(port).unwrap_err();
        assert_eq!(err.port, port);
        assert!(!err.message.is_empty());
    }
}
