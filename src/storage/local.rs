//! On-device backend: a single JSON object file
//!
//! Every mutation rewrites the file atomically. A missing or unparsable file
//! reads as an empty record so that a damaged store falls back to defaults.

use std::path::{Path, PathBuf};

use serde_json::Value;

use super::backend::KeyValueBackend;
use super::file_io::{read_json_or_default, write_json_atomic};
use crate::error::SettingsResult;
use crate::models::SettingsMap;

/// Backend persisting all entries in one JSON file
#[derive(Debug, Clone)]
pub struct LocalFileBackend {
    path: PathBuf,
}

impl LocalFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> SettingsResult<SettingsMap> {
        read_json_or_default(&self.path)
    }
}

impl KeyValueBackend for LocalFileBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn get(&self, key: &str) -> SettingsResult<Option<Value>> {
        Ok(self.load()?.get(key).cloned())
    }

    fn get_all(&self) -> SettingsResult<SettingsMap> {
        self.load()
    }

    fn set(&mut self, entries: &SettingsMap) -> SettingsResult<()> {
        let mut data = self.load()?;
        for (key, value) in entries {
            data.insert(key.clone(), value.clone());
        }
        write_json_atomic(&self.path, &data)
    }

    fn remove(&mut self, key: &str) -> SettingsResult<()> {
        let mut data = self.load()?;
        if data.shift_remove(key).is_some() {
            write_json_atomic(&self.path, &data)?;
        }
        Ok(())
    }

    fn clear(&mut self) -> SettingsResult<()> {
        write_json_atomic(&self.path, &SettingsMap::new())
    }
}
