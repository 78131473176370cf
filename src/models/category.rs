//! Setting categories
//!
//! Categories group schemas for display (e.g. "Appearance", "Editor").
//! Registering a category stamps its id onto every contained schema.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::schema::SettingSchema;

/// A named group of setting schemas
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    /// Unique identifier
    pub id: String,

    /// Display label
    pub label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Schemas in display order
    #[serde(default)]
    pub settings: Vec<SettingSchema>,
}

impl Category {
    /// Create an empty category
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            settings: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a schema to this category
    pub fn setting(mut self, schema: SettingSchema) -> Self {
        self.settings.push(schema);
        self
    }

    /// Keys of the contained schemas, in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.settings.iter().map(|s| s.key.as_str())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}
