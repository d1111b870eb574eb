//! # linkwatch-core
//!
//! Connection-lifecycle supervision for network-attached devices.
//!
//! This crate provides:
//! - Data model types (Credentials, ConnectionState, FailureReason, ...)
//! - Retry/backoff policy
//! - Driver seams (Radio, SocketFactory, Clock)
//! - The `ConnectionSupervisor` state machine
//! - Configuration model and storage trait
//!
//! This crate is intentionally runtime-agnostic and contains no async code
//! or I/O, making it usable on both Linux and ESP32 (esp-idf) targets.

pub mod config;
pub mod driver;
pub mod model;
pub mod policy;
pub mod supervisor;

pub use config::{ConfigError, ConfigStorage, SupervisorSettings};
pub use driver::{BindError, Clock, LinkStatus, Radio, RadioError, SocketFactory};
pub use model::*;
pub use policy::RetryPolicy;
pub use supervisor::{ConnectionSupervisor, SupervisorConfig, DEFAULT_PORT};
