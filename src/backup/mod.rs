//! Backup system for note-settings
//!
//! Provides point-in-time backups of the committed settings with retention
//! limits, and a timer-driven scheduler on top.
//!
//! # Architecture
//!
//! - `BackupManager`: creates, lists, exports, imports and prunes backups
//! - `AutoBackupScheduler`: runs the manager on an interval with its own
//!   retention for auto-tagged backups
//! - `validate_serialized`: inspects a serialized record before import
//!
//! # Backup Format
//!
//! Each backup is a JSON file named after its id:
//! - `id`: Backup identifier
//! - `timestamp`: Creation time in epoch milliseconds
//! - `version`: Record format version
//! - `settings`: Full copy of the committed settings
//! - `metadata`: Optional `userAgent`, `platform`, `appVersion`,
//!   `description` and `auto`
//!
//! # Retention Policy
//!
//! The manager keeps at most `max_backups` of each class (auto and manual).
//! The scheduler additionally prunes auto backups beyond `max_auto_backups`.
//!
//! # Example
//!
//! ```rust,ignore
//! use note_settings::backup::{BackupManager, BackupOptions};
//!
//! let manager = BackupManager::new(paths.backup_dir(), clock, 10);
//! let id = manager.create_backup(&values, BackupOptions::manual(None))?;
//! let restored = manager.restore_backup(&id)?;
//! ```

mod auto;
mod manager;
mod restore;

pub use auto::{
    AutoBackupConfig, AutoBackupConfigPatch, AutoBackupScheduler, AutoBackupStatus,
    FailureCallback, SchedulerState, SnapshotSource,
};
pub use manager::{
    BackupManager, BackupMetadata, BackupOptions, BackupRecord, BackupStats,
    BACKUP_FORMAT_VERSION, DEFAULT_MAX_BACKUPS,
};
pub use restore::{validate_serialized, BackupValidation};
