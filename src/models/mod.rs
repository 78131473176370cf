//! Core data models for note-settings
//!
//! Schemas, categories, identifiers and the value map shared by every other
//! module.

pub mod category;
pub mod ids;
pub mod schema;
pub mod value;

pub use category::Category;
pub use ids::{BackupId, SnapshotId};
pub use schema::{ChoiceOption, CustomRule, Rule, SettingKind, SettingSchema};
pub use value::{normalize, SettingsMap};
