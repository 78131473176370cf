//! Service layer for note-settings
//!
//! [`SettingsService`] ties the registry, validator, storage adapter,
//! backups and event bus together behind one public contract.

pub mod preview;
pub mod settings;
pub mod transfer;

pub use preview::{PreviewEntry, PreviewTable};
pub use settings::{PollOutcome, SettingsService};
pub use transfer::{ExportData, ImportResult, EXPORT_FORMAT_VERSION};
