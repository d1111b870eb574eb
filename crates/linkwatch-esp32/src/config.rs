//! NVS (Non-Volatile Storage) configuration for ESP32.
//!
//! Settings are stored as one JSON string under a single NVS key.

use std::sync::Mutex;

use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

use linkwatch_core::{ConfigError, ConfigStorage, SupervisorSettings};

const NAMESPACE: &str = "linkwatch";
const SETTINGS_KEY: &str = "settings";

/// Largest settings blob read back from flash.
const MAX_SETTINGS_LEN: usize = 1024;

/// Settings persisted in the default NVS partition.
pub struct NvsConfigStorage {
    nvs: Mutex<EspNvs<NvsDefault>>,
}

impl NvsConfigStorage {
    pub fn new(partition: EspDefaultNvsPartition) -> anyhow::Result<Self> {
        let nvs = EspNvs::new(partition, NAMESPACE, true)?;
        Ok(Self {
            nvs: Mutex::new(nvs),
        })
    }
}

impl ConfigStorage for NvsConfigStorage {
    fn load_settings(&self) -> Result<SupervisorSettings, ConfigError> {
        let nvs = self
            .nvs
            .lock()
            .map_err(|_| ConfigError::ReadError("NVS lock poisoned".to_string()))?;

        let mut buf = [0u8; MAX_SETTINGS_LEN];
        let json = nvs
            .get_str(SETTINGS_KEY, &mut buf)
            .map_err(|e| ConfigError::ReadError(e.to_string()))?
            .ok_or_else(|| ConfigError::NotFound(SETTINGS_KEY.to_string()))?;

        serde_json::from_str(json).map_err(|e| ConfigError::InvalidData(e.to_string()))
    }

    fn save_settings(&self, settings: &SupervisorSettings) -> Result<(), ConfigError> {
        let json =
            serde_json::to_string(settings).map_err(|e| ConfigError::WriteError(e.to_string()))?;
        if json.len() >= MAX_SETTINGS_LEN {
            return Err(ConfigError::WriteError(format!(
                "settings too large for NVS ({} bytes)",
                json.len()
            )));
        }

        self.nvs
            .lock()
            .map_err(|_| ConfigError::WriteError("NVS lock poisoned".to_string()))?
            .set_str(SETTINGS_KEY, &json)
            .map_err(|e| ConfigError::WriteError(e.to_string()))
    }

    fn has_settings(&self) -> bool {
        self.nvs
            .lock()
            .ok()
            .and_then(|nvs| nvs.contains(SETTINGS_KEY).ok())
            .unwrap_or(false)
    }
}
