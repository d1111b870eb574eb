//! Platform seams used by the supervisor.
//!
//! Implementations provide platform-specific behavior:
//! - Linux: `SystemClock`, `TcpSocketFactory`, `SimulatedRadio` (linkwatch-std)
//! - ESP32: `EspClock`, `EspRadio` (linkwatch-esp32)
//!
//! Every method must return without waiting on the network. The supervisor
//! calls them from inside `poll()`.

use std::time::Duration;
use thiserror::Error;

use crate::model::{Credentials, LinkInfo};

/// Monotonic time source.
pub trait Clock {
    /// Time elapsed since an arbitrary fixed epoch. Never goes backwards.
    fn now(&self) -> Duration;
}

/// Association status as seen by the radio driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    /// Not associated and not trying.
    Down,
    /// Association in progress.
    Pending,
    /// Associated with an address.
    Up(LinkInfo),
    /// The last attempt was refused (bad secret, unknown network, ...).
    Rejected(String),
}

/// Error reported by a radio driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("radio error: {0}")]
pub struct RadioError(pub String);

/// Wireless station driver.
pub trait Radio {
    /// Kick off an association attempt. Must not wait for the result.
    fn begin(&mut self, credentials: &Credentials) -> Result<(), RadioError>;

    /// Non-blocking status check.
    fn status(&mut self) -> LinkStatus;

    /// Drop the association (or abort the pending attempt).
    fn disconnect(&mut self);
}

/// Error returned when a listening socket cannot be created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("bind failed on port {port}: {message}")]
pub struct BindError {
    pub port: u16,
    pub message: String,
}

/// Creates listening sockets.
///
/// The supervisor owns the returned socket and drops it when leaving
/// `Connected`; implementations release the OS resource in `Drop`.
pub trait SocketFactory {
    type Socket;

    fn bind(&mut self, port: u16) -> Result<Self::Socket, BindError>;
}
