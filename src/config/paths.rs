//! Path management for note-settings
//!
//! Provides platform-aware path resolution for the engine config, the local
//! settings store and backups.
//!
//! ## Path Resolution Order
//!
//! 1. `NOTE_SETTINGS_DIR` environment variable (if set)
//! 2. The platform config directory from `directories::ProjectDirs`
//!    (`~/.config/note-settings` on Linux)

use std::path::PathBuf;

use directories::ProjectDirs;

use crate::error::SettingsError;

/// Environment variable overriding the base directory
pub const BASE_DIR_ENV: &str = "NOTE_SETTINGS_DIR";

/// Manages all paths used by the settings engine
#[derive(Debug, Clone)]
pub struct SettingsPaths {
    /// Base directory for all engine data
    base_dir: PathBuf,
}

impl SettingsPaths {
    /// Resolve the base directory
    ///
    /// # Errors
    ///
    /// Returns an error if no platform config directory can be determined.
    pub fn new() -> Result<Self, SettingsError> {
        let base_dir = if let Ok(custom) = std::env::var(BASE_DIR_ENV) {
            PathBuf::from(custom)
        } else {
            ProjectDirs::from("", "", "note-settings")
                .map(|dirs| dirs.config_dir().to_path_buf())
                .ok_or_else(|| {
                    SettingsError::Config("Could not determine a config directory".into())
                })?
        };

        Ok(Self { base_dir })
    }

    /// Create SettingsPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Directory holding the local settings store
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.base_dir.join("backups")
    }

    /// Engine configuration file
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("engine.json")
    }

    /// File backing the local key-value store
    pub fn store_file(&self) -> PathBuf {
        self.data_dir().join("settings.json")
    }

    /// Ensure the base, data and backup directories exist
    pub fn ensure_directories(&self) -> Result<(), SettingsError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| SettingsError::Io(format!("Failed to create base directory: {}", e)))?;

        std::fs::create_dir_all(self.data_dir())
            .map_err(|e| SettingsError::Io(format!("Failed to create data directory: {}", e)))?;

        std::fs::create_dir_all(self.backup_dir())
            .map_err(|e| SettingsError::Io(format!("Failed to create backup directory: {}", e)))?;

        Ok(())
    }
}
