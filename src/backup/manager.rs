//! Backup manager for note-settings
//!
//! Each backup is one JSON record in the backup directory, named after its
//! id. Retention is enforced on every creation, counted separately for
//! scheduler-created and manual backups.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::restore::validate_serialized;
use crate::clock::Clock;
use crate::error::{SettingsError, SettingsResult};
use crate::models::{BackupId, SettingsMap};

/// Format version written into every record
pub const BACKUP_FORMAT_VERSION: &str = "1.0.0";

/// Default cap on backups of each class
pub const DEFAULT_MAX_BACKUPS: usize = 10;

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

/// Optional descriptive data attached to a backup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Created by the auto-backup scheduler
    #[serde(default, skip_serializing_if = "is_false")]
    pub auto: bool,
    /// Creation order within this directory; breaks timestamp ties
    #[serde(default, skip_serializing_if = "is_zero")]
    pub sequence: u64,
    /// Creation time carried over from an imported record
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub original_timestamp: Option<DateTime<Utc>>,
}

/// An immutable copy of the committed settings at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    pub id: BackupId,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub settings: SettingsMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BackupMetadata>,
}

impl BackupRecord {
    /// Whether the scheduler created this record
    pub fn is_auto(&self) -> bool {
        self.metadata.as_ref().is_some_and(|m| m.auto)
    }

    pub fn description(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.description.as_deref())
    }

    fn sequence(&self) -> u64 {
        self.metadata.as_ref().map_or(0, |m| m.sequence)
    }

    /// Newest first, creation order breaking ties
    fn newer_first(a: &Self, b: &Self) -> std::cmp::Ordering {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.sequence().cmp(&a.sequence()))
    }
}

/// Caller-supplied details for a new backup
#[derive(Debug, Clone, Default)]
pub struct BackupOptions {
    pub description: Option<String>,
    pub user_agent: Option<String>,
    pub auto: bool,
}

impl BackupOptions {
    pub fn manual(description: Option<String>) -> Self {
        Self {
            description,
            ..Self::default()
        }
    }

    pub fn auto(description: Option<String>) -> Self {
        Self {
            description,
            auto: true,
            ..Self::default()
        }
    }
}

/// Summary of what the backup directory holds
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackupStats {
    pub count: usize,
    pub auto_count: usize,
    pub manual_count: usize,
    pub total_bytes: u64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

/// Manages backup creation, lookup and retention
pub struct BackupManager {
    backup_dir: PathBuf,
    clock: Arc<dyn Clock>,
    max_backups: usize,
    app_version: String,
    platform: String,
}

impl BackupManager {
    pub fn new(backup_dir: impl Into<PathBuf>, clock: Arc<dyn Clock>, max_backups: usize) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            clock,
            max_backups,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            platform: std::env::consts::OS.to_string(),
        }
    }

    /// Override the version and platform stamped into metadata
    pub fn with_host(mut self, app_version: impl Into<String>, platform: impl Into<String>) -> Self {
        self.app_version = app_version.into();
        self.platform = platform.into();
        self
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn max_backups(&self) -> usize {
        self.max_backups
    }

    /// Snapshot `values` and enforce retention for the record's class
    pub fn create_backup(
        &self,
        values: &SettingsMap,
        options: BackupOptions,
    ) -> SettingsResult<BackupId> {
        let record = BackupRecord {
            id: BackupId::new(),
            timestamp: self.clock.now(),
            version: BACKUP_FORMAT_VERSION.to_string(),
            settings: values.clone(),
            metadata: Some(BackupMetadata {
                user_agent: options.user_agent,
                platform: Some(self.platform.clone()),
                app_version: Some(self.app_version.clone()),
                description: options.description,
                auto: options.auto,
                sequence: self.next_sequence()?,
                original_timestamp: None,
            }),
        };

        self.write_record(&record)?;
        tracing::info!(
            backup = %record.id.short(),
            auto = options.auto,
            settings = record.settings.len(),
            "Created settings backup"
        );

        self.enforce_retention(options.auto, self.max_backups)?;
        Ok(record.id)
    }

    /// All backups, newest first
    pub fn backups(&self) -> SettingsResult<Vec<BackupRecord>> {
        Ok(self
            .read_all()?
            .into_iter()
            .map(|(record, _)| record)
            .collect())
    }

    /// Look up one backup
    pub fn backup(&self, id: &BackupId) -> SettingsResult<Option<BackupRecord>> {
        let path = self.record_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)
            .map_err(|e| SettingsError::Io(format!("Failed to read backup file: {}", e)))?;
        let record = serde_json::from_str(&contents)
            .map_err(|e| SettingsError::Backup(format!("Backup {} is malformed: {}", id.short(), e)))?;
        Ok(Some(record))
    }

    /// The settings held by a backup
    ///
    /// Nothing is applied here; the caller decides what to do with the map.
    pub fn restore_backup(&self, id: &BackupId) -> SettingsResult<SettingsMap> {
        self.backup(id)?
            .map(|record| record.settings)
            .ok_or_else(|| SettingsError::backup_not_found(id.to_string()))
    }

    /// Delete one backup; returns whether it existed
    pub fn delete_backup(&self, id: &BackupId) -> SettingsResult<bool> {
        let path = self.record_path(id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)
            .map_err(|e| SettingsError::Io(format!("Failed to delete backup: {}", e)))?;
        Ok(true)
    }

    /// Delete every backup; returns how many were removed
    pub fn clear_backups(&self) -> SettingsResult<usize> {
        let mut removed = 0;
        for path in self.record_files()? {
            fs::remove_file(&path)
                .map_err(|e| SettingsError::Io(format!("Failed to delete backup: {}", e)))?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Serialize a backup for moving it elsewhere
    pub fn export_backup(&self, id: &BackupId) -> SettingsResult<String> {
        let record = self
            .backup(id)?
            .ok_or_else(|| SettingsError::backup_not_found(id.to_string()))?;
        Ok(serde_json::to_string_pretty(&record)?)
    }

    /// Store a serialized backup under a fresh id
    ///
    /// The record is checked before anything is written. Imported records
    /// always count as manual backups and are stamped with the import time,
    /// so retention never removes the record just imported. The declared
    /// creation time is kept as `original_timestamp`.
    pub fn import_backup(&self, serialized: &str) -> SettingsResult<BackupId> {
        let validation = validate_serialized(serialized);
        if !validation.is_valid {
            return Err(SettingsError::Backup(format!(
                "Invalid backup: {}",
                validation.problems.join("; ")
            )));
        }

        let raw: serde_json::Value = serde_json::from_str(serialized)?;
        let mut metadata: BackupMetadata = raw
            .get("metadata")
            .cloned()
            .and_then(|m| serde_json::from_value(m).ok())
            .unwrap_or_default();
        metadata.auto = false;
        metadata.sequence = self.next_sequence()?;
        metadata.original_timestamp = validation.timestamp;

        let record = BackupRecord {
            id: BackupId::new(),
            timestamp: self.clock.now(),
            version: validation.version.unwrap_or_else(|| BACKUP_FORMAT_VERSION.into()),
            settings: match raw.get("settings") {
                Some(serde_json::Value::Object(map)) => map.clone(),
                _ => SettingsMap::new(),
            },
            metadata: Some(metadata),
        };

        self.write_record(&record)?;
        tracing::info!(backup = %record.id.short(), "Imported settings backup");
        self.enforce_retention(false, self.max_backups)?;
        Ok(record.id)
    }

    pub fn stats(&self) -> SettingsResult<BackupStats> {
        let records = self.read_all()?;
        let mut stats = BackupStats {
            count: records.len(),
            newest: records.first().map(|(r, _)| r.timestamp),
            oldest: records.last().map(|(r, _)| r.timestamp),
            ..BackupStats::default()
        };
        for (record, bytes) in &records {
            if record.is_auto() {
                stats.auto_count += 1;
            } else {
                stats.manual_count += 1;
            }
            stats.total_bytes += bytes;
        }
        Ok(stats)
    }

    /// Keep only the newest `keep` backups of one class
    ///
    /// Returns how many were deleted.
    pub fn enforce_retention(&self, auto: bool, keep: usize) -> SettingsResult<usize> {
        let mut deleted = 0;
        for (record, _) in self
            .read_all()?
            .into_iter()
            .filter(|(record, _)| record.is_auto() == auto)
            .skip(keep)
        {
            fs::remove_file(self.record_path(&record.id)).map_err(|e| {
                SettingsError::Io(format!("Failed to delete old backup: {}", e))
            })?;
            deleted += 1;
        }
        if deleted > 0 {
            tracing::debug!(deleted, auto, keep, "Pruned old backups");
        }
        Ok(deleted)
    }

    fn next_sequence(&self) -> SettingsResult<u64> {
        Ok(self
            .read_all()?
            .iter()
            .map(|(record, _)| record.sequence())
            .max()
            .map_or(1, |last| last + 1))
    }

    fn record_path(&self, id: &BackupId) -> PathBuf {
        self.backup_dir.join(format!("{}.json", id.as_uuid()))
    }

    fn write_record(&self, record: &BackupRecord) -> SettingsResult<()> {
        fs::create_dir_all(&self.backup_dir).map_err(|e| {
            SettingsError::Io(format!("Failed to create backup directory: {}", e))
        })?;

        let json = serde_json::to_string_pretty(record)
            .map_err(|e| SettingsError::Json(format!("Failed to serialize backup: {}", e)))?;

        fs::write(self.record_path(&record.id), json)
            .map_err(|e| SettingsError::Io(format!("Failed to write backup file: {}", e)))
    }

    fn record_files(&self) -> SettingsResult<Vec<PathBuf>> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.backup_dir)
            .map_err(|e| SettingsError::Io(format!("Failed to read backup directory: {}", e)))?
        {
            let entry = entry
                .map_err(|e| SettingsError::Io(format!("Failed to read directory entry: {}", e)))?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        Ok(files)
    }

    /// Every readable record with its size on disk, newest first
    fn read_all(&self) -> SettingsResult<Vec<(BackupRecord, u64)>> {
        let mut records = Vec::new();
        for path in self.record_files()? {
            match read_record(&path) {
                Some(entry) => records.push(entry),
                None => tracing::warn!(path = %path.display(), "Skipping unreadable backup file"),
            }
        }
        records.sort_by(|(a, _), (b, _)| BackupRecord::newer_first(a, b));
        Ok(records)
    }
}

fn read_record(path: &Path) -> Option<(BackupRecord, u64)> {
    let contents = fs::read_to_string(path).ok()?;
    let record = serde_json::from_str(&contents).ok()?;
    Some((record, contents.len() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_test_manager(max_backups: usize) -> (BackupManager, Arc<ManualClock>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::at_millis(1_700_000_000_000));
        let manager = BackupManager::new(temp_dir.path().join("backups"), clock.clone(), max_backups)
            .with_host("2.0.0", "linux");
        (manager, clock, temp_dir)
    }

    fn sample_settings() -> SettingsMap {
        let mut map = SettingsMap::new();
        map.insert("appearance.theme".into(), json!("dark"));
        map.insert("editor.fontSize".into(), json!(14));
        map
    }

    #[test]
    fn test_create_and_restore() {
        let (manager, _clock, _temp) = create_test_manager(DEFAULT_MAX_BACKUPS);
        let id = manager
            .create_backup(&sample_settings(), BackupOptions::manual(Some("before upgrade".into())))
            .unwrap();

        let record = manager.backup(&id).unwrap().unwrap();
        assert_eq!(record.version, BACKUP_FORMAT_VERSION);
        assert_eq!(record.description(), Some("before upgrade"));
        assert!(!record.is_auto());
        let metadata = record.metadata.unwrap();
        assert_eq!(metadata.app_version.as_deref(), Some("2.0.0"));
        assert_eq!(metadata.platform.as_deref(), Some("linux"));

        assert_eq!(manager.restore_backup(&id).unwrap(), sample_settings());
    }

    #[test]
    fn test_missing_backup() {
        let (manager, _clock, _temp) = create_test_manager(DEFAULT_MAX_BACKUPS);
        let id = BackupId::new();
        assert!(manager.backup(&id).unwrap().is_none());
        assert!(manager.restore_backup(&id).unwrap_err().is_not_found());
        assert!(manager.export_backup(&id).unwrap_err().is_not_found());
        assert!(!manager.delete_backup(&id).unwrap());
    }

    #[test]
    fn test_retention_keeps_newest() {
        let (manager, clock, _temp) = create_test_manager(3);
        let mut ids = Vec::new();
        for _ in 0..6 {
            ids.push(manager.create_backup(&sample_settings(), BackupOptions::default()).unwrap());
            clock.advance(Duration::from_secs(1));
        }

        let remaining: Vec<_> = manager.backups().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(remaining, vec![ids[5], ids[4], ids[3]]);
    }

    #[test]
    fn test_retention_counts_classes_separately() {
        let (manager, clock, _temp) = create_test_manager(2);
        let manual = manager.create_backup(&sample_settings(), BackupOptions::default()).unwrap();
        for _ in 0..4 {
            clock.advance(Duration::from_secs(1));
            manager.create_backup(&sample_settings(), BackupOptions::auto(None)).unwrap();
        }

        let stats = manager.stats().unwrap();
        assert_eq!(stats.auto_count, 2);
        assert_eq!(stats.manual_count, 1);
        assert!(manager.backup(&manual).unwrap().is_some());
    }

    #[test]
    fn test_export_import_assigns_fresh_id() {
        let (manager, clock, _temp) = create_test_manager(DEFAULT_MAX_BACKUPS);
        let id = manager.create_backup(&sample_settings(), BackupOptions::auto(None)).unwrap();
        let exported = manager.export_backup(&id).unwrap();

        clock.advance(Duration::from_secs(1));
        let imported = manager.import_backup(&exported).unwrap();
        assert_ne!(imported, id);

        let record = manager.backup(&imported).unwrap().unwrap();
        assert_eq!(record.settings, sample_settings());
        assert!(!record.is_auto());
        assert_eq!(manager.backups().unwrap().len(), 2);
    }

    #[test]
    fn test_import_rejects_malformed_record() {
        let (manager, _clock, _temp) = create_test_manager(DEFAULT_MAX_BACKUPS);
        let err = manager.import_backup(r#"{"version": "1.0.0"}"#).unwrap_err();
        assert!(matches!(err, SettingsError::Backup(_)));
        assert!(manager.import_backup("not json").is_err());
        assert!(manager.backups().unwrap().is_empty());
    }

    #[test]
    fn test_import_accepts_foreign_ids() {
        let (manager, clock, _temp) = create_test_manager(DEFAULT_MAX_BACKUPS);
        let serialized = r#"{
            "id": "backup_1700000000000",
            "timestamp": 1700000000000,
            "version": "1.0.0",
            "settings": {"appearance.theme": "light"},
            "metadata": {"userAgent": "Mozilla/5.0", "description": "from browser"}
        }"#;

        clock.advance(Duration::from_secs(30));
        let id = manager.import_backup(serialized).unwrap();
        let record = manager.backup(&id).unwrap().unwrap();
        assert_eq!(record.description(), Some("from browser"));
        assert_eq!(record.timestamp, clock.now());
        let original = record.metadata.unwrap().original_timestamp.unwrap();
        assert_eq!(original.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_import_into_full_manual_class_is_kept() {
        let (manager, clock, _temp) = create_test_manager(3);
        let old = manager
            .create_backup(&sample_settings(), BackupOptions::manual(Some("old".into())))
            .unwrap();
        let exported = manager.export_backup(&old).unwrap();
        for _ in 0..3 {
            clock.advance(Duration::from_secs(1));
            manager.create_backup(&sample_settings(), BackupOptions::default()).unwrap();
        }
        assert!(manager.backup(&old).unwrap().is_none());

        clock.advance(Duration::from_secs(1));
        let imported = manager.import_backup(&exported).unwrap();
        let backups = manager.backups().unwrap();
        assert_eq!(backups.len(), 3);
        assert_eq!(backups[0].id, imported);
        assert_eq!(backups[0].description(), Some("old"));
    }

    #[test]
    fn test_same_millisecond_backups_keep_creation_order() {
        let (manager, _clock, _temp) = create_test_manager(2);
        let ids: Vec<_> = (0..4)
            .map(|_| manager.create_backup(&sample_settings(), BackupOptions::default()).unwrap())
            .collect();

        let remaining: Vec<_> = manager.backups().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(remaining, vec![ids[3], ids[2]]);
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let (manager, _clock, _temp) = create_test_manager(DEFAULT_MAX_BACKUPS);
        let id = manager.create_backup(&sample_settings(), BackupOptions::default()).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&manager.export_backup(&id).unwrap()).unwrap();

        assert_eq!(json["timestamp"], json!(1_700_000_000_000_i64));
        assert_eq!(json["metadata"]["appVersion"], json!("2.0.0"));
        assert!(json["metadata"].get("auto").is_none());
    }

    #[test]
    fn test_clear_and_stats() {
        let (manager, clock, _temp) = create_test_manager(DEFAULT_MAX_BACKUPS);
        assert_eq!(manager.stats().unwrap(), BackupStats::default());

        manager.create_backup(&sample_settings(), BackupOptions::default()).unwrap();
        clock.advance(Duration::from_secs(60));
        manager.create_backup(&sample_settings(), BackupOptions::auto(None)).unwrap();

        let stats = manager.stats().unwrap();
        assert_eq!(stats.count, 2);
        assert!(stats.total_bytes > 0);
        assert!(stats.newest > stats.oldest);

        assert_eq!(manager.clear_backups().unwrap(), 2);
        assert!(manager.backups().unwrap().is_empty());
    }

    #[test]
    fn test_unreadable_files_are_skipped() {
        let (manager, _clock, _temp) = create_test_manager(DEFAULT_MAX_BACKUPS);
        manager.create_backup(&sample_settings(), BackupOptions::default()).unwrap();
        fs::write(manager.backup_dir().join("garbage.json"), "{{{").unwrap();

        assert_eq!(manager.backups().unwrap().len(), 1);
    }
}
