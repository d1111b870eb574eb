//! # linkwatch-std
//!
//! `std` adapters for the linkwatch supervisor:
//! - [`SystemClock`] - monotonic clock over `Instant`
//! - [`TcpSocketFactory`] - non-blocking `std::net` listeners
//! - [`FileConfigStorage`] - JSON settings file
//! - [`SimulatedRadio`] - scripted radio for host runs and tests
//! - [`Command`] - parsing for the administrative command surface
//!
//! Everything here builds on both Linux and ESP-IDF std targets.

pub mod clock;
pub mod command;
pub mod net;
pub mod sim;
pub mod storage;

pub use clock::SystemClock;
pub use command::{Command, CommandError};
pub use net::{TcpListenSocket, TcpSocketFactory};
pub use sim::{SimulatedRadio, SimulationPlan};
pub use storage::{FileConfigStorage, CONFIG_PATH_ENV};

/// Supervisor wired to the host adapters.
pub type HostSupervisor<R = SimulatedRadio> =
    linkwatch_core::ConnectionSupervisor<R, TcpSocketFactory, SystemClock>;
