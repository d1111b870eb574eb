//! ESP32-specific components for the linkwatch supervisor.
//!
//! This crate provides:
//! - `EspRadio` - station-mode WiFi driver behind the `Radio` seam
//! - `EspClock` - monotonic time since boot
//! - `NvsConfigStorage` - settings persisted in NVS flash
//! - `run` - the cooperative driver loop for a device main
//!
//! Sockets come from `linkwatch_std::TcpSocketFactory`, which works on
//! ESP-IDF's std (lwIP) as-is.
//!
//! # Example
//!
//! ```ignore
//! let peripherals = Peripherals::take()?;
//! let sysloop = EspSystemEventLoop::take()?;
//! let nvs = EspDefaultNvsPartition::take()?;
//!
//! let storage = NvsConfigStorage::new(nvs.clone())?;
//! let radio = EspRadio::new(peripherals.modem, sysloop, Some(nvs))?;
//! linkwatch_esp32::run(&storage, radio)?;
//! ```

pub mod config;
pub mod radio;

pub use config::NvsConfigStorage;
pub use radio::{EspClock, EspRadio};

use anyhow::Context;
use linkwatch_core::{ConfigStorage, ConnectionState, ConnectionSupervisor};
use linkwatch_std::TcpSocketFactory;
use log::{error, info};

/// Supervise the connection forever, serving the listening socket.
///
/// Returns only on a configuration error. A terminal failure restarts the
/// whole cycle after a pause, since a headless device has no operator to
/// send `connect`.
pub fn run(storage: &impl ConfigStorage, radio: EspRadio) -> anyhow::Result<()> {
    let settings = storage.load_settings().context("loading settings from NVS")?;
    let credentials = settings.credentials()?;
    let config = settings.supervisor_config()?;
    let restart_pause = config.retry.max_delay;

    let mut supervisor =
        ConnectionSupervisor::new(config, radio, TcpSocketFactory::any(), EspClock);
    supervisor.start(credentials.clone());

    loop {
        let state = supervisor.poll();
        for event in supervisor.drain_events() {
            info!("[{} ms] {}", event.at.as_millis(), event.state);
        }

        if let Some(socket) = supervisor.socket() {
            while let Ok(Some((_stream, peer))) = socket.try_accept() {
                info!("accepted connection from {}", peer);
            }
        }

        if let ConnectionState::Failed(reason) = state {
            error!("connection failed: {}; restarting", reason);
            std::thread::sleep(restart_pause);
            supervisor.start(credentials.clone());
            continue;
        }

        std::thread::sleep(supervisor.poll_interval());
    }
}
