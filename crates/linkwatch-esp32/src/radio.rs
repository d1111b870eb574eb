//! WiFi station and clock adapters for ESP32.

use std::net::IpAddr;
use std::time::Duration;

use anyhow::Result;
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::peripheral,
    nvs::EspDefaultNvsPartition,
    systime::EspSystemTime,
    wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi},
};
use log::{info, warn};

use linkwatch_core::{Clock, Credentials, LinkInfo, LinkStatus, Radio, RadioError};

/// Time since boot from the ESP-IDF system timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct EspClock;

impl Clock for EspClock {
    fn now(&self) -> Duration {
        EspSystemTime.now()
    }
}

/// Station-mode radio over `EspWifi`.
///
/// `begin` configures the station and issues a non-blocking connect;
/// `status` only inspects driver and netif state.
pub struct EspRadio {
    wifi: Box<EspWifi<'static>>,
    attempting: bool,
}

impl EspRadio {
    /// Take the modem and bring up the WiFi driver (not yet associated).
    pub fn new(
        modem: impl peripheral::Peripheral<P = esp_idf_svc::hal::modem::Modem> + 'static,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
    ) -> Result<Self> {
        let wifi = EspWifi::new(modem, sysloop, nvs)?;
        Ok(Self {
            wifi: Box::new(wifi),
            attempting: false,
        })
    }

    fn configure(&mut self, credentials: &Credentials) -> Result<(), RadioError> {
        let auth_method = if credentials.is_open() {
            info!("WiFi password is empty, using open network");
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };

        let config = Configuration::Client(ClientConfiguration {
            ssid: credentials
                .ssid()
                .try_into()
                .map_err(|_| RadioError("SSID too long (max 32 chars)".to_string()))?,
            password: credentials
                .password()
                .try_into()
                .map_err(|_| RadioError("Password too long (max 64 chars)".to_string()))?,
            auth_method,
            ..Default::default()
        });

        self.wifi
            .set_configuration(&config)
            .map_err(|e| RadioError(e.to_string()))?;

        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi.start().map_err(|e| RadioError(e.to_string()))?;
        }
        Ok(())
    }

    fn link_info(&self) -> Option<LinkInfo> {
        let netif = self.wifi.sta_netif();
        let ip_info = netif.get_ip_info().ok()?;
        let mac = netif.get_mac().ok()?;
        Some(LinkInfo {
            ip: IpAddr::V4(ip_info.ip),
            mac,
        })
    }
}

impl Radio for EspRadio {
    fn begin(&mut self, credentials: &Credentials) -> Result<(), RadioError> {
        self.configure(credentials)?;

        info!("Connecting to '{}'...", credentials.ssid());
        self.wifi.connect().map_err(|e| RadioError(e.to_string()))?;
        self.attempting = true;
        Ok(())
    }

    fn status(&mut self) -> LinkStatus {
        if self.wifi.is_up().unwrap_or(false) {
            if let Some(info) = self.link_info() {
                return LinkStatus::Up(info);
            }
        }
        if self.attempting {
            // Associated but waiting for DHCP counts as pending too.
            LinkStatus::Pending
        } else {
            LinkStatus::Down
        }
    }

    fn disconnect(&mut self) {
        self.attempting = false;
        if let Err(e) = self.wifi.disconnect() {
            warn!("WiFi disconnect failed: {}", e);
        }
    }
}
