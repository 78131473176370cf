//! Preview table
//!
//! Uncommitted values, each with its own expiry deadline. Replacing a key's
//! preview replaces only that key's deadline.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct PreviewEntry {
    pub value: Value,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct PreviewTable {
    entries: BTreeMap<String, PreviewEntry>,
}

impl PreviewTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a preview, returning the one it replaced
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: Value,
        expires_at: DateTime<Utc>,
    ) -> Option<PreviewEntry> {
        self.entries
            .insert(key.into(), PreviewEntry { value, expires_at })
    }

    pub fn get(&self, key: &str) -> Option<&PreviewEntry> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<PreviewEntry> {
        self.entries.remove(key)
    }

    /// Drop every preview, returning the keys that were held
    pub fn clear(&mut self) -> Vec<String> {
        std::mem::take(&mut self.entries).into_keys().collect()
    }

    /// Remove and return the keys whose deadline has passed
    pub fn take_expired(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.entries.remove(key);
        }
        expired
    }

    /// Earliest pending expiry
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.entries.values().map(|entry| entry.expires_at).min()
    }
}
