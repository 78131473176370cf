//! Custom error types for note-settings
//!
//! This module defines the error hierarchy for the settings engine using
//! thiserror. Validation failures have their own type in
//! [`crate::validation::ValidationError`] and are wrapped here when they need
//! to cross a `Result` boundary.

use thiserror::Error;

use crate::validation::ValidationError;

/// The main error type for settings engine operations
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// YAML serialization/deserialization errors
    #[error("YAML error: {0}")]
    Yaml(String),

    /// Key-value backend errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Process bridge errors
    #[error("Bridge error: {0}")]
    Bridge(String),

    /// Backup creation, lookup or restore errors
    #[error("Backup error: {0}")]
    Backup(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// A value was rejected by the validator
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Import errors
    #[error("Import error: {0}")]
    Import(String),
}

impl SettingsError {
    /// Create a "not found" error for backups
    pub fn backup_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Backup",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<std::io::Error> for SettingsError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<serde_yaml::Error> for SettingsError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml(err.to_string())
    }
}

/// Result type alias for settings engine operations
pub type SettingsResult<T> = Result<T, SettingsError>;
