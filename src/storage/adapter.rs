//! Debounced storage adapter
//!
//! Sits between the settings service and a [`KeyValueBackend`]. Writes are
//! buffered and flushed as a single merged `set` once the debounce window
//! after the last write has elapsed. Reads always go to the backend, with
//! still-buffered writes overlaid so callers see their own changes.
//!
//! The adapter also keeps raw snapshots of the whole store inside the backend
//! under reserved keys. Those keys never show up in [`StorageAdapter::get_all`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::backend::KeyValueBackend;
use crate::clock::Clock;
use crate::error::{SettingsError, SettingsResult};
use crate::models::{SettingsMap, SnapshotId};
use crate::timer::Debouncer;

/// Key prefix reserved for store snapshots
pub const SNAPSHOT_PREFIX: &str = "__snapshot__:";

/// Default debounce window for persisted writes
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Callback run with the flushed entries after each successful flush
pub type SyncHook = Box<dyn FnMut(&SettingsMap) + Send>;

/// Raw copy of the persisted store at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub id: SnapshotId,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub settings: SettingsMap,
}

fn snapshot_key(id: &SnapshotId) -> String {
    format!("{}{}", SNAPSHOT_PREFIX, id.as_uuid())
}

fn is_snapshot_key(key: &str) -> bool {
    key.starts_with(SNAPSHOT_PREFIX)
}

pub struct StorageAdapter {
    backend: Box<dyn KeyValueBackend>,
    clock: Arc<dyn Clock>,
    debounce: Debouncer,
    pending: SettingsMap,
    sync_enabled: bool,
    sync_hook: Option<SyncHook>,
    last_flush: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl StorageAdapter {
    pub fn new(backend: Box<dyn KeyValueBackend>, clock: Arc<dyn Clock>, debounce: Duration) -> Self {
        Self {
            backend,
            clock,
            debounce: Debouncer::new(debounce),
            pending: SettingsMap::new(),
            sync_enabled: false,
            sync_hook: None,
            last_flush: None,
            last_error: None,
        }
    }

    /// Enable or disable the sync hook
    pub fn set_sync_enabled(&mut self, enabled: bool) {
        self.sync_enabled = enabled;
    }

    pub fn sync_enabled(&self) -> bool {
        self.sync_enabled
    }

    /// Install the hook an external sync layer uses to observe flushes
    pub fn set_sync_hook(&mut self, hook: SyncHook) {
        self.sync_hook = Some(hook);
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    // === Reads ===

    /// Read one key, surfacing backend errors
    pub fn try_get(&self, key: &str) -> SettingsResult<Option<Value>> {
        if let Some(value) = self.pending.get(key) {
            return Ok(Some(value.clone()));
        }
        self.backend.get(key)
    }

    /// Read one key; backend failures read as absent
    pub fn get(&self, key: &str) -> Option<Value> {
        self.try_get(key).unwrap_or_else(|e| {
            tracing::warn!(key, error = %e, "Settings read failed, treating as absent");
            None
        })
    }

    /// Read every setting, surfacing backend errors
    pub fn try_get_all(&self) -> SettingsResult<SettingsMap> {
        let mut all: SettingsMap = self
            .backend
            .get_all()?
            .into_iter()
            .filter(|(key, _)| !is_snapshot_key(key))
            .collect();
        for (key, value) in &self.pending {
            all.insert(key.clone(), value.clone());
        }
        Ok(all)
    }

    /// Read every setting; backend failures read as an empty store
    pub fn get_all(&self) -> SettingsMap {
        self.try_get_all().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Settings read failed, treating store as empty");
            SettingsMap::new()
        })
    }

    // === Writes ===

    /// Buffer `entries` and restart the debounce window
    pub fn set(&mut self, entries: SettingsMap) {
        if entries.is_empty() {
            return;
        }
        for (key, value) in entries {
            self.pending.insert(key, value);
        }
        self.debounce.schedule(self.clock.now());
        tracing::debug!(pending = self.pending.len(), "Scheduled settings write");
    }

    /// Delete one key immediately
    pub fn remove(&mut self, key: &str) -> SettingsResult<()> {
        self.pending.shift_remove(key);
        if self.pending.is_empty() {
            self.debounce.cancel();
        }
        self.backend.remove(key)
    }

    /// Delete every setting immediately, keeping snapshots
    pub fn clear(&mut self) -> SettingsResult<()> {
        self.pending.clear();
        self.debounce.cancel();

        let stored = self.backend.get_all()?;
        if stored.keys().any(|k| is_snapshot_key(k)) {
            for key in stored.keys().filter(|k| !is_snapshot_key(k)) {
                self.backend.remove(key)?;
            }
            Ok(())
        } else {
            self.backend.clear()
        }
    }

    /// Flush buffered writes if the debounce window has elapsed
    ///
    /// Returns `None` when nothing was due.
    pub fn poll(&mut self) -> Option<SettingsResult<usize>> {
        if self.debounce.fire_if_due(self.clock.now()) {
            Some(self.flush())
        } else {
            None
        }
    }

    /// Write all buffered entries now as one backend `set`
    ///
    /// On failure the entries stay buffered (newer buffered values win) and
    /// go out with the next flush.
    pub fn flush(&mut self) -> SettingsResult<usize> {
        self.debounce.cancel();
        if self.pending.is_empty() {
            return Ok(0);
        }

        let entries = std::mem::take(&mut self.pending);
        match self.backend.set(&entries) {
            Ok(()) => {
                self.last_flush = Some(self.clock.now());
                self.last_error = None;
                tracing::debug!(
                    count = entries.len(),
                    backend = self.backend.name(),
                    "Flushed settings"
                );
                if self.sync_enabled {
                    if let Some(hook) = self.sync_hook.as_mut() {
                        hook(&entries);
                    }
                }
                Ok(entries.len())
            }
            Err(e) => {
                tracing::error!(
                    count = entries.len(),
                    backend = self.backend.name(),
                    error = %e,
                    "Failed to persist settings, keeping them buffered"
                );
                for (key, value) in entries {
                    if !self.pending.contains_key(&key) {
                        self.pending.insert(key, value);
                    }
                }
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn has_pending_writes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// When the next debounced flush is due
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.debounce.deadline()
    }

    pub fn last_flush(&self) -> Option<DateTime<Utc>> {
        self.last_flush
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // === Snapshots ===

    /// Snapshot the whole store, flushing buffered writes first
    pub fn backup(&mut self) -> SettingsResult<SnapshotId> {
        self.flush()?;
        let snapshot = StoreSnapshot {
            id: SnapshotId::new(),
            timestamp: self.clock.now(),
            settings: self.try_get_all()?,
        };

        let mut entry = SettingsMap::new();
        entry.insert(snapshot_key(&snapshot.id), serde_json::to_value(&snapshot)?);
        self.backend.set(&entry)?;

        tracing::info!(snapshot = %snapshot.id.short(), "Created store snapshot");
        Ok(snapshot.id)
    }

    /// Replace the store contents with a snapshot
    ///
    /// Returns `false` when no snapshot has that id.
    pub fn restore(&mut self, id: &SnapshotId) -> SettingsResult<bool> {
        let Some(raw) = self.backend.get(&snapshot_key(id))? else {
            return Ok(false);
        };
        let snapshot: StoreSnapshot = serde_json::from_value(raw).map_err(|e| {
            SettingsError::Backup(format!("Snapshot {} is malformed: {}", id.short(), e))
        })?;

        self.clear()?;
        self.backend.set(&snapshot.settings)?;
        tracing::info!(snapshot = %id.short(), "Restored store snapshot");
        Ok(true)
    }

    /// All snapshots, newest first
    pub fn list_backups(&self) -> SettingsResult<Vec<StoreSnapshot>> {
        let mut snapshots: Vec<StoreSnapshot> = self
            .backend
            .get_all()?
            .into_iter()
            .filter(|(key, _)| is_snapshot_key(key))
            .filter_map(|(key, raw)| match serde_json::from_value(raw) {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    tracing::warn!(key, error = %e, "Skipping malformed store snapshot");
                    None
                }
            })
            .collect();

        snapshots.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(snapshots)
    }

    /// Delete one snapshot; returns whether it existed
    pub fn delete_backup(&mut self, id: &SnapshotId) -> SettingsResult<bool> {
        let key = snapshot_key(id);
        if self.backend.get(&key)?.is_none() {
            return Ok(false);
        }
        self.backend.remove(&key)?;
        Ok(true)
    }

    /// Delete snapshots older than `retention_days`; returns how many went
    ///
    /// A retention window reaching past the earliest representable time
    /// keeps every snapshot.
    pub fn clean_old_backups(&mut self, retention_days: u32) -> SettingsResult<usize> {
        let Some(cutoff) = chrono::Duration::try_days(i64::from(retention_days))
            .and_then(|window| self.clock.now().checked_sub_signed(window))
        else {
            return Ok(0);
        };
        let mut removed = 0;
        for snapshot in self.list_backups()? {
            if snapshot.timestamp < cutoff {
                self.backend.remove(&snapshot_key(&snapshot.id))?;
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::info!(removed, retention_days, "Cleaned old store snapshots");
        }
        Ok(removed)
    }
}
