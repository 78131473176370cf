//! Key-value backend abstraction
//!
//! The engine never talks to a platform store directly. Everything goes
//! through [`KeyValueBackend`], whose `set` merges entries into the persisted
//! record rather than replacing it.

use serde_json::Value;

use crate::error::SettingsResult;
use crate::models::SettingsMap;

/// A persisted key-value medium
pub trait KeyValueBackend: Send {
    /// Short name used in log lines
    fn name(&self) -> &'static str;

    /// Read one key
    fn get(&self, key: &str) -> SettingsResult<Option<Value>>;

    /// Read every stored entry
    fn get_all(&self) -> SettingsResult<SettingsMap>;

    /// Merge `entries` into the stored record
    fn set(&mut self, entries: &SettingsMap) -> SettingsResult<()>;

    /// Delete one key; deleting a missing key is not an error
    fn remove(&mut self, key: &str) -> SettingsResult<()>;

    /// Delete everything
    fn clear(&mut self) -> SettingsResult<()>;
}

impl<B: KeyValueBackend + ?Sized> KeyValueBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn get(&self, key: &str) -> SettingsResult<Option<Value>> {
        (**self).get(key)
    }

    fn get_all(&self) -> SettingsResult<SettingsMap> {
        (**self).get_all()
    }

    fn set(&mut self, entries: &SettingsMap) -> SettingsResult<()> {
        (**self).set(entries)
    }

    fn remove(&mut self, key: &str) -> SettingsResult<()> {
        (**self).remove(key)
    }

    fn clear(&mut self) -> SettingsResult<()> {
        (**self).clear()
    }
}
