//! Configuration module for note-settings
//!
//! This module provides configuration management including:
//! - Platform-aware path resolution
//! - Engine configuration persistence

pub mod paths;
pub mod settings;

pub use paths::SettingsPaths;
pub use settings::{BackendKind, EngineConfig, StorageSettings};
