//! Configuration storage abstraction.
//!
//! This module provides traits for configuration storage that can be
//! implemented differently on each platform:
//! - Linux: JSON file (`~/.linkwatch/settings.json`)
//! - ESP32: NVS (Non-Volatile Storage)
//!
//! The supervisor never reads storage itself. The owner loads settings,
//! turns them into [`Credentials`] and a [`SupervisorConfig`], and hands
//! those over at construction.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::model::{Credentials, CredentialsError};
use crate::policy::RetryPolicy;
use crate::supervisor::SupervisorConfig;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The requested configuration was not found.
    #[error("Configuration not found: {0}")]
    NotFound(String),

    /// Failed to read configuration.
    #[error("Read error: {0}")]
    ReadError(String),

    /// Failed to write configuration.
    #[error("Write error: {0}")]
    WriteError(String),

    /// Configuration data is invalid.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Stored credentials are unusable.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(#[from] CredentialsError),
}

/// Abstract configuration storage.
///
/// All methods are synchronous to support embedded platforms.
pub trait ConfigStorage {
    /// Load supervisor settings.
    fn load_settings(&self) -> Result<SupervisorSettings, ConfigError>;

    /// Save supervisor settings.
    fn save_settings(&self, settings: &SupervisorSettings) -> Result<(), ConfigError>;

    /// Check whether settings have been saved before.
    fn has_settings(&self) -> bool;
}

/// Persisted supervisor settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorSettings {
    /// Network to join.
    pub wifi: WifiConfig,

    /// Listening port (default 80).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Retry and backoff overrides.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetrySettings>,

    /// Driver loop tick in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,

    /// Status events buffered between drains.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_capacity: Option<usize>,
}

/// WiFi network credentials as stored.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiConfig {
    /// WiFi network SSID.
    pub ssid: String,

    /// WiFi network password (empty for open networks).
    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for WifiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WifiConfig")
            .field("ssid", &self.ssid)
            .field("password", &"***")
            .finish()
    }
}

/// Retry overrides; unset fields keep [`RetryPolicy::default`] values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrySettings {
    /// Consecutive failures before giving up. `0` retries forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_delay_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub association_timeout_ms: Option<u64>,
}

impl RetrySettings {
    /// Apply these overrides on top of the default policy.
    pub fn to_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            max_attempts: match self.max_attempts {
                Some(0) => None,
                Some(n) => Some(n),
                None => defaults.max_attempts,
            },
            base_delay: self
                .base_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.base_delay),
            max_delay: self
                .max_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_delay),
            association_timeout: self
                .association_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.association_timeout),
        }
    }
}

impl SupervisorSettings {
    /// Validated credentials for the configured network.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        Ok(Credentials::new(
            self.wifi.ssid.clone(),
            self.wifi.password.clone(),
        )?)
    }

    /// Supervisor configuration with defaults filled in.
    pub fn supervisor_config(&self) -> Result<SupervisorConfig, ConfigError> {
        let defaults = SupervisorConfig::default();
        let retry = self.retry.as_ref().map(RetrySettings::to_policy).unwrap_or(defaults.retry);

        if retry.base_delay > retry.max_delay {
            return Err(ConfigError::InvalidData(format!(
                "baseDelayMs ({}) exceeds maxDelayMs ({})",
                retry.base_delay.as_millis(),
                retry.max_delay.as_millis()
            )));
        }
        if retry.association_timeout.is_zero() {
            return Err(ConfigError::InvalidData(
                "associationTimeoutMs must be positive".to_string(),
            ));
        }

        Ok(SupervisorConfig {
            retry,
            port: self.port.unwrap_or(defaults.port),
            poll_interval: self
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            event_capacity: self.event_capacity.unwrap_or(defaults.event_capacity),
        })
    }
}
