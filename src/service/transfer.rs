//! Export and import formats
//!
//! Exports are `{version, timestamp, settings}` documents. JSON is the
//! interchange format; YAML is offered for hand-editing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{SettingsError, SettingsResult};
use crate::models::SettingsMap;

/// Format version written into exports
pub const EXPORT_FORMAT_VERSION: &str = "1.0.0";

/// A portable copy of some or all settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportData {
    pub version: String,
    /// RFC 3339 creation time
    pub timestamp: String,
    pub settings: SettingsMap,
}

impl ExportData {
    pub fn new(timestamp: String, settings: SettingsMap) -> Self {
        Self {
            version: EXPORT_FORMAT_VERSION.to_string(),
            timestamp,
            settings,
        }
    }

    pub fn to_json(&self) -> SettingsResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> SettingsResult<Self> {
        serde_json::from_str(json).map_err(|e| SettingsError::Import(e.to_string()))
    }

    /// Serialize with a short header comment
    pub fn to_yaml(&self) -> SettingsResult<String> {
        let body = serde_yaml::to_string(self)?;
        Ok(format!(
            "# note-settings export\n# Generated: {}\n\n{}",
            self.timestamp, body
        ))
    }

    pub fn from_yaml(yaml: &str) -> SettingsResult<Self> {
        serde_yaml::from_str(yaml).map_err(|e| SettingsError::Import(e.to_string()))
    }
}

/// Outcome of an import
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportResult {
    /// False when anything failed validation; nothing was applied then
    pub success: bool,
    /// Registered keys accepted from the import
    pub imported_count: usize,
    /// Failure message per key
    pub errors: BTreeMap<String, String>,
    /// Keys ignored because no schema is registered for them
    pub skipped: Vec<String>,
}

impl ImportResult {
    pub fn failed(errors: BTreeMap<String, String>, skipped: Vec<String>) -> Self {
        Self {
            success: false,
            imported_count: 0,
            errors,
            skipped,
        }
    }
}
