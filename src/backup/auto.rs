//! Auto-backup scheduler
//!
//! A two-state machine (`Stopped`, `Running { next_due }`) driven by
//! [`AutoBackupScheduler::tick`]. Each due tick creates an auto-tagged backup
//! through the [`BackupManager`] and prunes auto backups beyond the
//! scheduler's own limit. Manual backups are never touched by that pruning.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::manager::{BackupManager, BackupOptions};
use crate::clock::after;
use crate::error::{SettingsError, SettingsResult};
use crate::models::{BackupId, SettingsMap};

/// Callback told about every failed auto-backup
pub type FailureCallback = Box<dyn FnMut(&SettingsError) + Send>;

/// Auto-backup settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoBackupConfig {
    /// Start the scheduler when the service opens
    #[serde(default)]
    pub enabled: bool,

    /// Time between backups in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// How many auto backups to keep
    #[serde(default = "default_max_auto_backups")]
    pub max_auto_backups: usize,
}

fn default_interval_ms() -> u64 {
    60 * 60 * 1000
}

fn default_max_auto_backups() -> usize {
    5
}

impl Default for AutoBackupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: default_interval_ms(),
            max_auto_backups: default_max_auto_backups(),
        }
    }
}

impl AutoBackupConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Partial update for [`AutoBackupConfig`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoBackupConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_auto_backups: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running { next_due: DateTime<Utc> },
}

/// Snapshot of the scheduler for display
#[derive(Debug, Clone, PartialEq)]
pub struct AutoBackupStatus {
    pub running: bool,
    pub config: AutoBackupConfig,
    pub next_due: Option<DateTime<Utc>>,
    pub last_backup_at: Option<DateTime<Utc>>,
    pub last_backup_id: Option<BackupId>,
    pub last_error: Option<String>,
    pub backups_created: usize,
    pub failures: usize,
}

/// Something that can hand over the full current settings map
pub trait SnapshotSource {
    fn snapshot(&self) -> SettingsMap;
}

impl SnapshotSource for SettingsMap {
    fn snapshot(&self) -> SettingsMap {
        self.clone()
    }
}

impl<F> SnapshotSource for F
where
    F: Fn() -> SettingsMap,
{
    fn snapshot(&self) -> SettingsMap {
        self()
    }
}

pub struct AutoBackupScheduler {
    config: AutoBackupConfig,
    state: SchedulerState,
    on_failure: Option<FailureCallback>,
    last_backup_at: Option<DateTime<Utc>>,
    last_backup_id: Option<BackupId>,
    last_error: Option<String>,
    backups_created: usize,
    failures: usize,
}

impl AutoBackupScheduler {
    pub fn new(config: AutoBackupConfig) -> Self {
        Self {
            config,
            state: SchedulerState::Stopped,
            on_failure: None,
            last_backup_at: None,
            last_backup_id: None,
            last_error: None,
            backups_created: 0,
            failures: 0,
        }
    }

    pub fn set_failure_callback(&mut self, callback: FailureCallback) {
        self.on_failure = Some(callback);
    }

    pub fn config(&self) -> &AutoBackupConfig {
        &self.config
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SchedulerState::Running { .. })
    }

    /// When the next backup is due, if running
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        match self.state {
            SchedulerState::Running { next_due } => Some(next_due),
            SchedulerState::Stopped => None,
        }
    }

    /// Back up immediately and arm the interval
    ///
    /// The scheduler is running afterwards even if that first backup failed.
    pub fn start(
        &mut self,
        manager: &BackupManager,
        source: &dyn SnapshotSource,
        now: DateTime<Utc>,
    ) -> SettingsResult<BackupId> {
        self.arm(now);
        tracing::info!(
            interval_ms = self.config.interval_ms,
            max_auto_backups = self.config.max_auto_backups,
            "Auto-backup started"
        );
        self.run_backup(manager, &source.snapshot(), None)
    }

    pub fn stop(&mut self) {
        if self.is_running() {
            tracing::info!("Auto-backup stopped");
        }
        self.state = SchedulerState::Stopped;
    }

    /// Merge `patch` into the config, re-arming from `now` when running
    ///
    /// Disabling stops the scheduler. Returns true when the patch enables a
    /// stopped scheduler; the caller then [`start`](Self::start)s it, since
    /// that needs a manager and a source.
    pub fn update_config(&mut self, patch: AutoBackupConfigPatch, now: DateTime<Utc>) -> bool {
        if let Some(interval_ms) = patch.interval_ms {
            self.config.interval_ms = interval_ms;
        }
        if let Some(max) = patch.max_auto_backups {
            self.config.max_auto_backups = max;
        }
        match patch.enabled {
            Some(false) => {
                self.config.enabled = false;
                self.stop();
                false
            }
            Some(true) => {
                self.config.enabled = true;
                if self.is_running() {
                    self.arm(now);
                    false
                } else {
                    true
                }
            }
            None => {
                if self.is_running() {
                    self.arm(now);
                }
                false
            }
        }
    }

    pub fn status(&self) -> AutoBackupStatus {
        AutoBackupStatus {
            running: self.is_running(),
            config: self.config.clone(),
            next_due: self.next_deadline(),
            last_backup_at: self.last_backup_at,
            last_backup_id: self.last_backup_id,
            last_error: self.last_error.clone(),
            backups_created: self.backups_created,
            failures: self.failures,
        }
    }

    /// Run a due backup, if any
    ///
    /// Returns `None` when stopped or not yet due.
    pub fn tick(
        &mut self,
        manager: &BackupManager,
        source: &dyn SnapshotSource,
        now: DateTime<Utc>,
    ) -> Option<SettingsResult<BackupId>> {
        match self.state {
            SchedulerState::Running { next_due } if now >= next_due => {
                self.arm(now);
                Some(self.run_backup(manager, &source.snapshot(), None))
            }
            _ => None,
        }
    }

    /// Back up right now without touching the timer
    pub fn force_backup(
        &mut self,
        manager: &BackupManager,
        values: &SettingsMap,
        description: Option<String>,
    ) -> SettingsResult<BackupId> {
        let description = description.unwrap_or_else(|| "Forced backup".to_string());
        self.run_backup(manager, values, Some(description))
    }

    fn arm(&mut self, now: DateTime<Utc>) {
        self.state = SchedulerState::Running {
            next_due: after(now, self.config.interval()),
        };
    }

    fn run_backup(
        &mut self,
        manager: &BackupManager,
        values: &SettingsMap,
        description: Option<String>,
    ) -> SettingsResult<BackupId> {
        let result = manager
            .create_backup(values, BackupOptions::auto(description))
            .and_then(|id| {
                manager.enforce_retention(true, self.config.max_auto_backups)?;
                Ok(id)
            });

        match &result {
            Ok(id) => {
                self.last_backup_at = manager.backup(id).ok().flatten().map(|r| r.timestamp);
                self.last_backup_id = Some(*id);
                self.last_error = None;
                self.backups_created += 1;
            }
            Err(e) => {
                tracing::error!(error = %e, "Auto-backup failed");
                self.last_error = Some(e.to_string());
                self.failures += 1;
                if let Some(callback) = self.on_failure.as_mut() {
                    callback(e);
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn create_test_env() -> (BackupManager, Arc<ManualClock>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::at_millis(1_700_000_000_000));
        let manager = BackupManager::new(temp_dir.path().join("backups"), clock.clone(), 10);
        (manager, clock, temp_dir)
    }

    fn config(interval_ms: u64, max_auto_backups: usize) -> AutoBackupConfig {
        AutoBackupConfig {
            enabled: true,
            interval_ms,
            max_auto_backups,
        }
    }

    fn values() -> SettingsMap {
        let mut map = SettingsMap::new();
        map.insert("a".into(), json!(1));
        map
    }

    #[test]
    fn test_start_backs_up_immediately() {
        let (manager, clock, _temp) = create_test_env();
        let mut scheduler = AutoBackupScheduler::new(config(1_000, 5));

        let id = scheduler.start(&manager, &values(), clock.now()).unwrap();
        assert!(scheduler.is_running());
        assert!(manager.backup(&id).unwrap().unwrap().is_auto());
        assert_eq!(
            scheduler.next_deadline(),
            Some(after(clock.now(), Duration::from_millis(1_000)))
        );
    }

    #[test]
    fn test_tick_only_when_due() {
        let (manager, clock, _temp) = create_test_env();
        let mut scheduler = AutoBackupScheduler::new(config(1_000, 5));
        scheduler.start(&manager, &values(), clock.now()).unwrap();

        clock.advance(Duration::from_millis(999));
        assert!(scheduler.tick(&manager, &values(), clock.now()).is_none());

        clock.advance(Duration::from_millis(1));
        assert!(scheduler.tick(&manager, &values(), clock.now()).unwrap().is_ok());
        assert_eq!(scheduler.status().backups_created, 2);

        scheduler.stop();
        clock.advance(Duration::from_secs(10));
        assert!(scheduler.tick(&manager, &values(), clock.now()).is_none());
        assert!(scheduler.next_deadline().is_none());
    }

    #[test]
    fn test_pruning_spares_manual_backups() {
        let (manager, clock, _temp) = create_test_env();
        let manual = manager
            .create_backup(&values(), BackupOptions::manual(Some("keep me".into())))
            .unwrap();

        let mut scheduler = AutoBackupScheduler::new(config(1_000, 2));
        let source = || values();
        clock.advance(Duration::from_millis(1));
        scheduler.start(&manager, &source, clock.now()).unwrap();
        for _ in 0..4 {
            clock.advance(Duration::from_millis(1_000));
            scheduler.tick(&manager, &source, clock.now()).unwrap().unwrap();
        }

        let stats = manager.stats().unwrap();
        assert_eq!(stats.auto_count, 2);
        assert_eq!(stats.manual_count, 1);
        assert!(manager.backup(&manual).unwrap().is_some());
    }

    #[test]
    fn test_update_config_rearms() {
        let (manager, clock, _temp) = create_test_env();
        let mut scheduler = AutoBackupScheduler::new(config(1_000, 5));
        scheduler.start(&manager, &values(), clock.now()).unwrap();

        clock.advance(Duration::from_millis(500));
        let needs_start = scheduler.update_config(
            AutoBackupConfigPatch {
                interval_ms: Some(5_000),
                ..Default::default()
            },
            clock.now(),
        );
        assert!(!needs_start);
        assert_eq!(scheduler.config().interval_ms, 5_000);
        assert_eq!(
            scheduler.next_deadline(),
            Some(after(clock.now(), Duration::from_millis(5_000)))
        );
    }

    #[test]
    fn test_update_config_enabled_flag() {
        let (manager, clock, _temp) = create_test_env();
        let mut scheduler = AutoBackupScheduler::new(config(1_000, 5));
        scheduler.start(&manager, &values(), clock.now()).unwrap();

        let disable = AutoBackupConfigPatch {
            enabled: Some(false),
            ..Default::default()
        };
        assert!(!scheduler.update_config(disable, clock.now()));
        let status = scheduler.status();
        assert!(!status.running);
        assert!(!status.config.enabled);

        let enable = AutoBackupConfigPatch {
            enabled: Some(true),
            ..Default::default()
        };
        assert!(scheduler.update_config(enable.clone(), clock.now()));
        assert!(scheduler.config().enabled);

        scheduler.start(&manager, &values(), clock.now()).unwrap();
        assert!(!scheduler.update_config(enable, clock.now()));
        assert!(scheduler.is_running());
    }

    #[test]
    fn test_failure_is_reported_and_scheduler_keeps_running() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("backups");
        std::fs::write(&blocker, "not a directory").unwrap();
        let clock = Arc::new(ManualClock::at_millis(0));
        let manager = BackupManager::new(&blocker, clock.clone(), 10);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut scheduler = AutoBackupScheduler::new(config(1_000, 5));
        scheduler.set_failure_callback(Box::new(move |e: &SettingsError| {
            sink.lock().unwrap().push(e.to_string())
        }));

        assert!(scheduler.start(&manager, &values(), clock.now()).is_err());
        assert!(scheduler.is_running());
        assert_eq!(seen.lock().unwrap().len(), 1);

        let status = scheduler.status();
        assert_eq!(status.failures, 1);
        assert!(status.last_error.is_some());
    }

    #[test]
    fn test_force_backup() {
        let (manager, _clock, _temp) = create_test_env();
        let mut scheduler = AutoBackupScheduler::new(AutoBackupConfig::default());

        let id = scheduler.force_backup(&manager, &values(), None).unwrap();
        assert!(!scheduler.is_running());
        let record = manager.backup(&id).unwrap().unwrap();
        assert_eq!(record.description(), Some("Forced backup"));
        assert_eq!(scheduler.status().last_backup_id, Some(id));
    }

    #[test]
    fn test_config_defaults() {
        let config: AutoBackupConfig = serde_json::from_str("{}").unwrap();
        assert!(!config.enabled);
        assert_eq!(config.interval_ms, 3_600_000);
        assert_eq!(config.max_auto_backups, 5);
    }
}
