//! note-settings - Schema-driven reactive settings engine
//!
//! This library provides the configuration engine of a note-taking
//! application: typed get/set access validated against host-supplied
//! schemas, live previews that roll back on their own, cross-setting
//! dependencies, debounced persistence to a pluggable key-value backend,
//! and point-in-time backups.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Engine configuration and path management
//! - `error`: Custom error types
//! - `models`: Schemas, categories, identifiers and setting values
//! - `registry`: Catalog of schemas and categories
//! - `validation`: Kind, bound, rule and dependency checks
//! - `storage`: Key-value backends and the debounced storage adapter
//! - `backup`: Backup records, retention and the auto-backup scheduler
//! - `events`: Typed change notifications
//! - `clock` / `timer`: Injectable time and the debounce state machine
//! - `service`: The settings service tying everything together
//!
//! # Example
//!
//! ```rust,ignore
//! use note_settings::config::SettingsPaths;
//! use note_settings::models::{Category, SettingSchema};
//! use note_settings::registry::SchemaRegistry;
//! use note_settings::service::SettingsService;
//!
//! let mut registry = SchemaRegistry::new();
//! registry.register_category(
//!     Category::new("editor", "Editor")
//!         .setting(SettingSchema::number("editor.fontSize", "Font size", 14.0).min(8.0).max(32.0)),
//! );
//!
//! let paths = SettingsPaths::new()?;
//! let mut settings = SettingsService::open(&paths, registry)?;
//! settings.init();
//! settings.set("editor.fontSize", 16);
//!
//! // From the host's event loop
//! settings.poll();
//! ```

pub mod backup;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod registry;
pub mod service;
pub mod storage;
pub mod timer;
pub mod validation;

pub use error::{SettingsError, SettingsResult};
pub use events::{EventKind, SettingsEvent};
pub use service::SettingsService;
