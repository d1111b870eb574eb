//! File-based configuration storage.
//!
//! Settings live in a single pretty-printed JSON file, by default
//! `~/.linkwatch/settings.json`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use linkwatch_core::{ConfigError, ConfigStorage, SupervisorSettings};

/// Environment variable overriding the settings file location.
pub const CONFIG_PATH_ENV: &str = "LINKWATCH_CONFIG";

/// JSON file storage for [`SupervisorSettings`].
#[derive(Debug, Clone)]
pub struct FileConfigStorage {
    path: PathBuf,
}

impl FileConfigStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Storage at `$LINKWATCH_CONFIG`, else `$HOME/.linkwatch/settings.json`,
    /// else `./linkwatch.json`.
    pub fn from_env() -> Self {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Self::new(path);
        }
        match std::env::var("HOME") {
            Ok(home) => Self::new(Path::new(&home).join(".linkwatch").join("settings.json")),
            Err(_) => Self::new("linkwatch.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStorage for FileConfigStorage {
    fn load_settings(&self) -> Result<SupervisorSettings, ConfigError> {
        let json = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ConfigError::NotFound(self.path.display().to_string()),
            _ => ConfigError::ReadError(e.to_string()),
        })?;
        debug!(path = %self.path.display(), "loaded settings");
        serde_json::from_str(&json).map_err(|e| ConfigError::InvalidData(e.to_string()))
    }

    fn save_settings(&self, settings: &SupervisorSettings) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(settings)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        // Write then rename so a crash never leaves a truncated file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| ConfigError::WriteError(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| ConfigError::WriteError(e.to_string()))?;

        debug!(path = %self.path.display(), "saved settings");
        Ok(())
    }

    fn has_settings(&self) -> bool {
        self.path.is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkwatch_core::config::{RetrySettings, WifiConfig};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let storage = FileConfigStorage::new(dir.path().join("nested").join("settings.json"));
        assert!(!storage.has_settings());

        let settings = SupervisorSettings {
            wifi: WifiConfig {
                ssid: "lab-net".to_string(),
                password: "secret".to_string(),
            },
            port: Some(8080),
            retry: Some(RetrySettings {
                max_attempts: Some(3),
                ..Default::default()
            }),
            ..Default::default()
        };
        storage.save_settings(&settings).unwrap();

        assert!(storage.has_settings());
        assert_eq!(storage.load_settings().unwrap(), settings);

        let raw = fs::read_to_string(storage.path()).unwrap();
        assert!(raw.contains("\"maxAttempts\": 3"));
        assert!(!storage.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let storage = FileConfigStorage::new(dir.path().join("settings.json"));
        assert!(matches!(
            storage.load_settings(),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn test_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let storage = FileConfigStorage::new(&path);
        assert!(matches!(
            storage.load_settings(),
            Err(ConfigError::InvalidData(_))
        ));
    }
}
