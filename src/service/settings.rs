//! Settings service
//!
//! The orchestrator and public contract of the engine. It owns the committed
//! value table and the preview table, asks the validator before every
//! mutation, hands accepted writes to the storage adapter, and notifies
//! listeners.
//!
//! All timers are deadlines; the host calls [`SettingsService::poll`] (for
//! example from its event loop) to flush debounced writes, expire previews
//! and run due auto-backups.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::preview::PreviewTable;
use super::transfer::{ExportData, ImportResult};
use crate::backup::{
    AutoBackupConfigPatch, AutoBackupScheduler, AutoBackupStatus, BackupManager, BackupOptions,
    BackupRecord, BackupStats, FailureCallback,
};
use crate::clock::{after, Clock, SystemClock};
use crate::config::{BackendKind, EngineConfig, SettingsPaths};
use crate::error::SettingsResult;
use crate::events::{EventBus, EventKind, Listener, ListenerId, SettingChange, SettingsEvent};
use crate::models::{normalize, BackupId, Category, SettingSchema, SettingsMap, SnapshotId};
use crate::registry::SchemaRegistry;
use crate::storage::{
    BridgeBackend, BridgeTransport, FallbackBackend, KeyValueBackend, LocalFileBackend,
    StorageAdapter,
};
use crate::validation::{validate_schema, ValidationError, Validator};

/// What one call to [`SettingsService::poll`] did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollOutcome {
    /// Entries written by a debounced flush
    pub flushed: usize,
    /// Previews that expired
    pub expired_previews: Vec<String>,
    /// Backup created by the scheduler
    pub auto_backup: Option<BackupId>,
}

pub struct SettingsService {
    registry: SchemaRegistry,
    storage: StorageAdapter,
    backups: BackupManager,
    scheduler: AutoBackupScheduler,
    events: EventBus,
    values: SettingsMap,
    previews: PreviewTable,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    initialized: bool,
    restart_required: BTreeSet<String>,
}

impl SettingsService {
    /// Assemble a service from its parts
    pub fn new(
        registry: SchemaRegistry,
        storage: StorageAdapter,
        backups: BackupManager,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            storage,
            backups,
            scheduler: AutoBackupScheduler::new(config.auto_backup.clone()),
            events: EventBus::new(),
            values: SettingsMap::new(),
            previews: PreviewTable::new(),
            clock,
            config,
            initialized: false,
            restart_required: BTreeSet::new(),
        }
    }

    /// Open the on-disk engine under `paths` with the local file backend
    ///
    /// A config asking for the bridge backend falls back to the local file,
    /// since no transport is available here; use
    /// [`open_with_bridge`](Self::open_with_bridge) for that.
    pub fn open(paths: &SettingsPaths, registry: SchemaRegistry) -> SettingsResult<Self> {
        let config = EngineConfig::load_or_create(paths)?;
        if config.storage.backend == BackendKind::Bridge {
            tracing::warn!("Bridge backend configured but no transport supplied, using local store");
        }
        let backend: Box<dyn KeyValueBackend> = Box::new(LocalFileBackend::new(paths.store_file()));
        Self::assemble(paths, registry, config, backend)
    }

    /// Open the on-disk engine, preferring a bridge to another process
    ///
    /// The local file backs the bridge up if it fails.
    pub fn open_with_bridge<T>(
        paths: &SettingsPaths,
        registry: SchemaRegistry,
        transport: T,
    ) -> SettingsResult<Self>
    where
        T: BridgeTransport + 'static,
    {
        let config = EngineConfig::load_or_create(paths)?;
        let local: Box<dyn KeyValueBackend> = Box::new(LocalFileBackend::new(paths.store_file()));
        let backend: Box<dyn KeyValueBackend> = match config.storage.backend {
            BackendKind::Bridge => Box::new(FallbackBackend::new(
                Box::new(BridgeBackend::new(transport)),
                local,
            )),
            BackendKind::Local => local,
        };
        Self::assemble(paths, registry, config, backend)
    }

    fn assemble(
        paths: &SettingsPaths,
        registry: SchemaRegistry,
        config: EngineConfig,
        backend: Box<dyn KeyValueBackend>,
    ) -> SettingsResult<Self> {
        paths.ensure_directories()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let mut storage = StorageAdapter::new(backend, clock.clone(), config.debounce());
        storage.set_sync_enabled(config.storage.sync_enabled);

        let backups = BackupManager::new(paths.backup_dir(), clock.clone(), config.max_backups)
            .with_host(config.app_version.clone(), config.platform.clone());

        Ok(Self::new(registry, storage, backups, clock, config))
    }

    // === Lifecycle ===

    /// Load persisted values and fill every registered key
    ///
    /// Idempotent. Never fails: a storage error is reported as an `Error`
    /// event and defaults are used.
    pub fn init(&mut self) {
        if self.initialized {
            return;
        }

        let loaded = match self.storage.try_get_all() {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load settings, using defaults");
                self.emit_error(None, format!("Failed to load settings: {}", e));
                SettingsMap::new()
            }
        };

        self.values = self.seed_values(loaded);
        self.initialized = true;

        if let Err(e) = self
            .storage
            .clean_old_backups(self.config.storage.snapshot_retention_days)
        {
            tracing::warn!(error = %e, "Failed to clean old store snapshots");
        }

        tracing::info!(
            settings = self.values.len(),
            schemas = self.registry.len(),
            backend = self.storage.backend_name(),
            "Settings initialized"
        );
        self.events.emit(&SettingsEvent::Initialized {
            count: self.values.len(),
        });

        if self.config.auto_backup.enabled && !self.scheduler.is_running() {
            self.start_auto_backup();
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Committed table for what storage holds
    fn seed_values(&self, loaded: SettingsMap) -> SettingsMap {
        let mut values = SettingsMap::new();
        for schema in self.registry.schemas() {
            values.insert(schema.key.clone(), seed_value(schema, loaded.get(&schema.key)));
        }
        // Keys persisted by other versions of the host stay untouched
        for (key, value) in loaded {
            if !values.contains_key(&key) {
                values.insert(key, value);
            }
        }
        values
    }

    /// Drive every timer: debounced flush, preview expiry, auto-backup
    pub fn poll(&mut self) -> PollOutcome {
        let now = self.clock.now();
        let mut outcome = PollOutcome::default();

        outcome.expired_previews = self.expire_previews(now);

        match self.storage.poll() {
            Some(Ok(count)) => outcome.flushed = count,
            Some(Err(e)) => self.emit_error(None, format!("Failed to persist settings: {}", e)),
            None => {}
        }

        if let Some(result) = self.scheduler.tick(&self.backups, &self.values, now) {
            outcome.auto_backup = self.report_auto_backup(result);
        }

        outcome
    }

    /// The earliest instant at which [`poll`](Self::poll) has work to do
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        [
            self.storage.next_deadline(),
            self.previews.next_deadline(),
            self.scheduler.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Write buffered changes now
    pub fn flush(&mut self) -> SettingsResult<usize> {
        self.storage.flush()
    }

    pub fn has_pending_writes(&self) -> bool {
        self.storage.has_pending_writes()
    }

    // === Schemas ===

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Register a schema on a live service, seeding its value
    pub fn register_schema(&mut self, schema: SettingSchema) {
        let key = schema.key.clone();
        self.registry.register_schema(schema);
        self.seed_key(&key);
    }

    /// Register a category on a live service, seeding its values
    pub fn register_category(&mut self, category: Category) {
        let keys: Vec<String> = category.keys().map(str::to_string).collect();
        self.registry.register_category(category);
        for key in keys {
            self.seed_key(&key);
        }
    }

    fn seed_key(&mut self, key: &str) {
        if !self.initialized || self.values.contains_key(key) {
            return;
        }
        if let Some(schema) = self.registry.schema(key) {
            let value = seed_value(schema, self.storage.get(key).as_ref());
            self.values.insert(key.to_string(), value);
        }
    }

    /// Committed keys whose schema needs an application restart
    pub fn restart_required(&self) -> Vec<String> {
        self.restart_required.iter().cloned().collect()
    }

    // === Reads ===

    /// Committed value, else the schema default
    pub fn get(&self, key: &str) -> Option<Value> {
        self.values
            .get(key)
            .cloned()
            .or_else(|| self.registry.schema(key).map(|s| normalize(s.default.clone())))
    }

    /// Like [`get`](Self::get), with a last-resort fallback
    pub fn get_or(&self, key: &str, fallback: impl Into<Value>) -> Value {
        self.get(key).unwrap_or_else(|| fallback.into())
    }

    /// Typed read; `None` when absent or of another shape
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|value| serde_json::from_value(value).ok())
    }

    pub fn get_all(&self) -> SettingsMap {
        self.values.clone()
    }

    pub fn get_by_category(&self, category_id: &str) -> SettingsMap {
        self.registry
            .schemas_by_category(category_id)
            .into_iter()
            .filter_map(|schema| self.get(&schema.key).map(|v| (schema.key.clone(), v)))
            .collect()
    }

    // === Writes ===

    /// Validate and commit one value
    ///
    /// Returns false (and emits an `Error` event) when the value is rejected.
    /// Setting a key to its current value succeeds without an event.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> bool {
        match self.stage(key, &value.into()) {
            Ok(Some(normalized)) => {
                let change = self.commit(key, normalized);
                self.events.emit(&SettingsEvent::Changed(change));
                true
            }
            Ok(None) => true,
            Err(e) => {
                self.reject(e);
                false
            }
        }
    }

    /// Apply `set` to each entry; listeners get one `BatchChanged` event
    /// once every accepted entry is committed
    pub fn batch_set(&mut self, updates: SettingsMap) -> BTreeMap<String, bool> {
        let mut results = BTreeMap::new();
        let mut changes = Vec::new();

        for (key, value) in updates {
            let accepted = match self.stage(&key, &value) {
                Ok(Some(normalized)) => {
                    changes.push(self.commit(&key, normalized));
                    true
                }
                Ok(None) => true,
                Err(e) => {
                    self.reject(e);
                    false
                }
            };
            results.insert(key, accepted);
        }

        if !changes.is_empty() {
            self.events.emit(&SettingsEvent::BatchChanged { changes });
        }
        results
    }

    /// Validate `value`, returning `None` when it equals the current value
    fn stage(&self, key: &str, value: &Value) -> Result<Option<Value>, ValidationError> {
        let validator = Validator::new(&self.registry);
        let normalized = validator.validate(key, value)?;
        if self.values.get(key) == Some(&normalized) {
            return Ok(None);
        }
        if self
            .registry
            .schema(key)
            .is_some_and(SettingSchema::has_dependencies)
        {
            validator.validate_with_dependencies(key, &normalized, &self.values)?;
        }
        Ok(Some(normalized))
    }

    fn commit(&mut self, key: &str, value: Value) -> SettingChange {
        let previous = self.values.insert(key.to_string(), value.clone());

        let mut entry = SettingsMap::new();
        entry.insert(key.to_string(), value.clone());
        self.storage.set(entry);

        if self
            .registry
            .schema(key)
            .is_some_and(|schema| schema.requires_restart)
        {
            self.restart_required.insert(key.to_string());
        }

        tracing::debug!(key, "Setting committed");
        SettingChange {
            key: key.to_string(),
            value,
            previous,
        }
    }

    fn reject(&mut self, error: ValidationError) {
        tracing::warn!(key = error.key(), error = %error, "Rejected setting");
        self.emit_error(Some(error.key().to_string()), error.to_string());
    }

    fn emit_error(&mut self, key: Option<String>, message: String) {
        self.events.emit(&SettingsEvent::Error { key, message });
    }

    // === Previews ===

    /// Show `value` for `key` without committing it
    ///
    /// The preview expires after `timeout` (the configured default when
    /// `None`). Previewing the same key again replaces its deadline.
    pub fn preview(&mut self, key: &str, value: impl Into<Value>, timeout: Option<Duration>) {
        let value = normalize(value.into());
        let timeout = timeout.unwrap_or_else(|| self.config.preview_timeout());
        let expires_at = after(self.clock.now(), timeout);

        self.previews.insert(key, value.clone(), expires_at);
        tracing::debug!(key, %expires_at, "Preview started");
        self.events.emit(&SettingsEvent::Preview {
            key: key.to_string(),
            value,
        });
    }

    /// The previewed value, unless its timeout has passed
    pub fn preview_value(&self, key: &str) -> Option<&Value> {
        let now = self.clock.now();
        self.previews
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| &entry.value)
    }

    /// Commit a pending preview through the normal `set` path
    ///
    /// The preview is removed whether or not the value is accepted. A preview
    /// whose timeout has passed is expired instead and nothing is committed.
    pub fn commit_preview(&mut self, key: &str) -> bool {
        let now = self.clock.now();
        if self
            .previews
            .get(key)
            .is_some_and(|entry| entry.expires_at <= now)
        {
            self.expire_previews(now);
            return false;
        }
        match self.previews.remove(key) {
            Some(entry) => self.set(key, entry.value),
            None => false,
        }
    }

    fn expire_previews(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let expired = self.previews.take_expired(now);
        for key in &expired {
            tracing::debug!(key, "Preview expired");
            self.events.emit(&SettingsEvent::PreviewCleared {
                key: key.clone(),
                expired: true,
            });
        }
        expired
    }

    /// Drop a preview without committing; returns whether one existed
    pub fn clear_preview(&mut self, key: &str) -> bool {
        if self.previews.remove(key).is_none() {
            return false;
        }
        self.events.emit(&SettingsEvent::PreviewCleared {
            key: key.to_string(),
            expired: false,
        });
        true
    }

    pub fn clear_all_previews(&mut self) -> usize {
        let keys = self.previews.clear();
        for key in &keys {
            self.events.emit(&SettingsEvent::PreviewCleared {
                key: key.clone(),
                expired: false,
            });
        }
        keys.len()
    }

    // === Resets ===

    /// Set `key` back to its default through the normal `set` path
    pub fn reset(&mut self, key: &str) -> bool {
        let Some(default) = self.registry.schema(key).map(|s| s.default.clone()) else {
            self.reject(ValidationError::UnknownKey(key.to_string()));
            return false;
        };
        if !self.set(key, default) {
            return false;
        }
        let value = self.get(key).unwrap_or(Value::Null);
        self.events.emit(&SettingsEvent::Reset {
            key: key.to_string(),
            value,
        });
        true
    }

    /// Reset every setting in a category; returns how many were accepted
    pub fn reset_category(&mut self, category_id: &str) -> usize {
        let keys: Vec<String> = self
            .registry
            .schemas_by_category(category_id)
            .into_iter()
            .map(|schema| schema.key.clone())
            .collect();
        keys.iter().filter(|key| self.reset(key)).count()
    }

    pub fn reset_all(&mut self) -> usize {
        let keys: Vec<String> = self.registry.keys().map(str::to_string).collect();
        keys.iter().filter(|key| self.reset(key)).count()
    }

    // === Export / import ===

    /// Export everything, or only the named categories
    pub fn export(&self, category_ids: Option<&[&str]>) -> ExportData {
        let settings = match category_ids {
            None => self.values.clone(),
            Some(ids) => self
                .registry
                .schemas_for_categories(ids)
                .into_iter()
                .filter_map(|schema| self.get(&schema.key).map(|v| (schema.key.clone(), v)))
                .collect(),
        };
        ExportData::new(self.clock.now().to_rfc3339(), settings)
    }

    /// Apply an export, all or nothing
    ///
    /// Every registered key in `data` must validate (dependencies are judged
    /// against the state after the import) or nothing changes. Keys with no
    /// schema are skipped.
    pub fn import(&mut self, data: &ExportData) -> ImportResult {
        let (known, skipped): (SettingsMap, SettingsMap) = data
            .settings
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .partition(|(key, _)| self.registry.has_schema(key));
        let skipped: Vec<String> = skipped.into_iter().map(|(key, _)| key).collect();
        if !skipped.is_empty() {
            tracing::warn!(count = skipped.len(), "Skipping unregistered keys on import");
        }

        let validator = Validator::new(&self.registry);
        let report = validator.validate_all(&known);
        let mut errors = report.messages();

        let mut merged = self.values.clone();
        for key in known.keys() {
            if let Some(value) = report.values.get(key) {
                merged.insert(key.clone(), value.clone());
            }
        }
        for key in known.keys() {
            let Some(value) = report.values.get(key) else {
                continue;
            };
            if self.values.get(key) == Some(value) {
                continue;
            }
            if let Err(e) = validator.validate_with_dependencies(key, value, &merged) {
                errors.insert(key.clone(), e.to_string());
            }
        }

        if !errors.is_empty() {
            tracing::warn!(errors = errors.len(), "Import rejected");
            self.emit_error(
                None,
                format!("Import rejected: {} invalid settings", errors.len()),
            );
            return ImportResult::failed(errors, skipped);
        }

        let mut changes = Vec::new();
        for key in known.keys() {
            let Some(value) = report.values.get(key).cloned() else {
                continue;
            };
            if self.values.get(key) != Some(&value) {
                changes.push(self.commit(key, value));
            }
        }

        let imported_count = known.len();
        if !changes.is_empty() {
            self.events.emit(&SettingsEvent::BatchChanged { changes });
        }
        self.events.emit(&SettingsEvent::Imported {
            count: imported_count,
        });
        tracing::info!(imported = imported_count, "Settings imported");

        ImportResult {
            success: true,
            imported_count,
            errors: BTreeMap::new(),
            skipped,
        }
    }

    /// Parse a JSON export and import it
    pub fn import_json(&mut self, json: &str) -> SettingsResult<ImportResult> {
        let data = ExportData::from_json(json)?;
        Ok(self.import(&data))
    }

    // === Backups ===

    /// Back up the committed table
    pub fn create_backup(&mut self, description: Option<String>) -> SettingsResult<BackupId> {
        self.backups
            .create_backup(&self.values, BackupOptions::manual(description))
    }

    pub fn backups(&self) -> SettingsResult<Vec<BackupRecord>> {
        self.backups.backups()
    }

    pub fn backup_stats(&self) -> SettingsResult<BackupStats> {
        self.backups.stats()
    }

    pub fn delete_backup(&mut self, id: &BackupId) -> SettingsResult<bool> {
        self.backups.delete_backup(id)
    }

    pub fn export_backup(&self, id: &BackupId) -> SettingsResult<String> {
        self.backups.export_backup(id)
    }

    pub fn import_backup(&mut self, serialized: &str) -> SettingsResult<BackupId> {
        self.backups.import_backup(serialized)
    }

    /// Restore a backup through the import path
    ///
    /// A missing or unreadable backup is an error and changes nothing.
    pub fn restore_backup(&mut self, id: &BackupId) -> SettingsResult<ImportResult> {
        let settings = self.backups.restore_backup(id)?;
        let data = ExportData::new(self.clock.now().to_rfc3339(), settings);
        let result = self.import(&data);
        tracing::info!(backup = %id.short(), success = result.success, "Restored backup");
        Ok(result)
    }

    /// Start the scheduler; backs up immediately
    pub fn start_auto_backup(&mut self) -> Option<BackupId> {
        let result = self
            .scheduler
            .start(&self.backups, &self.values, self.clock.now());
        self.report_auto_backup(result)
    }

    pub fn stop_auto_backup(&mut self) {
        self.scheduler.stop();
    }

    /// Change the schedule; enabling starts it and disabling stops it
    ///
    /// Returns the backup made when the patch starts the scheduler.
    pub fn update_auto_backup(&mut self, patch: AutoBackupConfigPatch) -> Option<BackupId> {
        let needs_start = self.scheduler.update_config(patch, self.clock.now());
        self.config.auto_backup = self.scheduler.config().clone();
        if needs_start {
            self.start_auto_backup()
        } else {
            None
        }
    }

    pub fn auto_backup_status(&self) -> AutoBackupStatus {
        self.scheduler.status()
    }

    /// Create an auto-class backup now, outside the schedule
    pub fn force_backup(&mut self, description: Option<String>) -> Option<BackupId> {
        let result = self
            .scheduler
            .force_backup(&self.backups, &self.values, description);
        self.report_auto_backup(result)
    }

    pub fn on_auto_backup_failure(&mut self, callback: FailureCallback) {
        self.scheduler.set_failure_callback(callback);
    }

    fn report_auto_backup(&mut self, result: SettingsResult<BackupId>) -> Option<BackupId> {
        match result {
            Ok(id) => {
                self.events.emit(&SettingsEvent::AutoBackupCreated { id });
                Some(id)
            }
            Err(e) => {
                self.events.emit(&SettingsEvent::AutoBackupFailed {
                    message: e.to_string(),
                });
                None
            }
        }
    }

    // === Storage ===

    /// Snapshot the persisted store, flushing buffered writes first
    pub fn snapshot_store(&mut self) -> SettingsResult<SnapshotId> {
        self.storage.backup()
    }

    /// Replace the persisted store with a snapshot and reload from it
    ///
    /// Returns `false` when no snapshot has that id. Listeners get one
    /// `BatchChanged` event for every committed value the snapshot changed.
    pub fn restore_snapshot(&mut self, id: &SnapshotId) -> SettingsResult<bool> {
        self.storage.flush()?;
        if !self.storage.restore(id)? {
            return Ok(false);
        }

        let values = self.seed_values(self.storage.try_get_all()?);
        let changes: Vec<SettingChange> = values
            .iter()
            .filter(|(key, value)| self.values.get(*key) != Some(*value))
            .map(|(key, value)| SettingChange {
                key: key.clone(),
                value: value.clone(),
                previous: self.values.get(key).cloned(),
            })
            .collect();
        self.values = values;

        tracing::info!(
            snapshot = %id.short(),
            changed = changes.len(),
            "Reloaded settings from snapshot"
        );
        if !changes.is_empty() {
            self.events.emit(&SettingsEvent::BatchChanged { changes });
        }
        Ok(true)
    }

    /// Direct access to the storage adapter
    pub fn storage(&self) -> &StorageAdapter {
        &self.storage
    }

    /// Mutable access to the storage adapter
    ///
    /// Changes made here bypass the committed value table; use
    /// [`restore_snapshot`](Self::restore_snapshot) to restore a snapshot.
    pub fn storage_mut(&mut self) -> &mut StorageAdapter {
        &mut self.storage
    }

    // === Events ===

    pub fn on(&mut self, kind: EventKind, listener: Listener) -> ListenerId {
        self.events.on(kind, listener)
    }

    pub fn once(&mut self, kind: EventKind, listener: Listener) -> ListenerId {
        self.events.once(kind, listener)
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.events.off(id)
    }
}

/// Value to seed for `schema` given what storage holds
fn seed_value(schema: &SettingSchema, persisted: Option<&Value>) -> Value {
    match persisted {
        Some(raw) => validate_schema(schema, raw).unwrap_or_else(|e| {
            tracing::warn!(key = %schema.key, error = %e, "Persisted value invalid, using default");
            normalize(schema.default.clone())
        }),
        None => normalize(schema.default.clone()),
    }
}
