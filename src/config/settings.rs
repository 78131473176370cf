//! Engine configuration for note-settings
//!
//! Timing, retention and backend choices for the engine itself. This is not
//! the user's settings table; that lives in the key-value store.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::paths::SettingsPaths;
use crate::backup::AutoBackupConfig;
use crate::error::SettingsError;

/// Which key-value backend the service persists to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// JSON file on this device (default)
    #[default]
    Local,
    /// Another process reached over a bridge, falling back to the local file
    Bridge,
}

/// Storage settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: BackendKind,

    /// Run the sync hook after each flush
    #[serde(default)]
    pub sync_enabled: bool,

    /// Days to keep raw store snapshots
    #[serde(default = "default_snapshot_retention_days")]
    pub snapshot_retention_days: u32,
}

fn default_snapshot_retention_days() -> u32 {
    30
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            sync_enabled: false,
            snapshot_retention_days: default_snapshot_retention_days(),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Delay between the last write in a burst and its flush
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// How long a preview lasts when the caller gives no timeout
    #[serde(default = "default_preview_timeout_ms")]
    pub preview_timeout_ms: u64,

    /// Cap on backups of each class
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,

    #[serde(default)]
    pub auto_backup: AutoBackupConfig,

    #[serde(default)]
    pub storage: StorageSettings,

    /// Version stamped into backup metadata
    #[serde(default = "default_app_version")]
    pub app_version: String,

    /// Platform stamped into backup metadata
    #[serde(default = "default_platform")]
    pub platform: String,
}

fn default_schema_version() -> u32 {
    1
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_preview_timeout_ms() -> u64 {
    5000
}

fn default_max_backups() -> usize {
    10
}

fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_platform() -> String {
    std::env::consts::OS.to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            debounce_ms: default_debounce_ms(),
            preview_timeout_ms: default_preview_timeout_ms(),
            max_backups: default_max_backups(),
            auto_backup: AutoBackupConfig::default(),
            storage: StorageSettings::default(),
            app_version: default_app_version(),
            platform: default_platform(),
        }
    }
}

impl EngineConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn preview_timeout(&self) -> Duration {
        Duration::from_millis(self.preview_timeout_ms)
    }

    /// Load config from disk, or defaults if the file doesn't exist
    pub fn load_or_create(paths: &SettingsPaths) -> Result<Self, SettingsError> {
        let config_path = paths.config_file();

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(|e| {
                SettingsError::Io(format!("Failed to read engine config: {}", e))
            })?;

            serde_json::from_str(&contents).map_err(|e| {
                SettingsError::Config(format!("Failed to parse engine config: {}", e))
            })
        } else {
            // Don't save yet - let caller decide when to persist
            Ok(Self::default())
        }
    }

    /// Save config to disk
    pub fn save(&self, paths: &SettingsPaths) -> Result<(), SettingsError> {
        paths.ensure_directories()?;

        let contents = serde_json::to_string_pretty(self).map_err(|e| {
            SettingsError::Config(format!("Failed to serialize engine config: {}", e))
        })?;

        std::fs::write(paths.config_file(), contents)
            .map_err(|e| SettingsError::Io(format!("Failed to write engine config: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.debounce(), Duration::from_millis(500));
        assert_eq!(config.preview_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_backups, 10);
        assert_eq!(config.storage.backend, BackendKind::Local);
        assert_eq!(config.storage.snapshot_retention_days, 30);
        assert!(!config.auto_backup.enabled);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let paths = SettingsPaths::with_base_dir(temp_dir.path().to_path_buf());

        let mut config = EngineConfig::default();
        config.debounce_ms = 250;
        config.storage.backend = BackendKind::Bridge;
        config.save(&paths).unwrap();

        let loaded = EngineConfig::load_or_create(&paths).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let paths = SettingsPaths::with_base_dir(temp_dir.path().to_path_buf());
        std::fs::write(
            paths.config_file(),
            r#"{"max_backups": 3, "storage": {"backend": "bridge"}}"#,
        )
        .unwrap();

        let loaded = EngineConfig::load_or_create(&paths).unwrap();
        assert_eq!(loaded.max_backups, 3);
        assert_eq!(loaded.storage.backend, BackendKind::Bridge);
        assert_eq!(loaded.debounce_ms, 500);
        assert_eq!(loaded.auto_backup.interval_ms, 3_600_000);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let paths = SettingsPaths::with_base_dir(temp_dir.path().to_path_buf());
        std::fs::write(paths.config_file(), "debounce_ms = 5").unwrap();

        let err = EngineConfig::load_or_create(&paths).unwrap_err();
        assert!(matches!(err, SettingsError::Config(_)));
    }
}
