//! In-process backend
//!
//! Cloning a [`MemoryBackend`] yields a handle onto the same map, so a host
//! (or a test) can keep one handle to inspect what the engine persisted.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::Value;

use super::backend::KeyValueBackend;
use crate::error::{SettingsError, SettingsResult};
use crate::models::SettingsMap;

#[derive(Debug, Default)]
struct Shared {
    data: RwLock<SettingsMap>,
    writes: AtomicUsize,
    failing: AtomicBool,
}

/// Backend holding entries in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with pre-populated entries
    pub fn with_entries(entries: SettingsMap) -> Self {
        let backend = Self::default();
        if let Ok(mut data) = backend.shared.data.write() {
            *data = entries;
        }
        backend
    }

    /// Number of successful `set` calls so far
    pub fn write_count(&self) -> usize {
        self.shared.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent operation fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.shared.failing.store(failing, Ordering::SeqCst);
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> SettingsMap {
        self.shared
            .data
            .read()
            .map(|data| data.clone())
            .unwrap_or_default()
    }

    fn check_available(&self) -> SettingsResult<()> {
        if self.shared.failing.load(Ordering::SeqCst) {
            Err(SettingsError::Storage("memory backend unavailable".into()))
        } else {
            Ok(())
        }
    }
}

impl KeyValueBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> SettingsResult<Option<Value>> {
        self.check_available()?;
        let data = self
            .shared
            .data
            .read()
            .map_err(|e| SettingsError::Storage(format!("Failed to acquire read lock: {}", e)))?;
        Ok(data.get(key).cloned())
    }

    fn get_all(&self) -> SettingsResult<SettingsMap> {
        self.check_available()?;
        let data = self
            .shared
            .data
            .read()
            .map_err(|e| SettingsError::Storage(format!("Failed to acquire read lock: {}", e)))?;
        Ok(data.clone())
    }

    fn set(&mut self, entries: &SettingsMap) -> SettingsResult<()> {
        self.check_available()?;
        let mut data = self
            .shared
            .data
            .write()
            .map_err(|e| SettingsError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        for (key, value) in entries {
            data.insert(key.clone(), value.clone());
        }
        self.shared.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> SettingsResult<()> {
        self.check_available()?;
        let mut data = self
            .shared
            .data
            .write()
            .map_err(|e| SettingsError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        data.shift_remove(key);
        Ok(())
    }

    fn clear(&mut self) -> SettingsResult<()> {
        self.check_available()?;
        let mut data = self
            .shared
            .data
            .write()
            .map_err(|e| SettingsError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        data.clear();
        Ok(())
    }
}
