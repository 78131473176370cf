//! Primary/secondary backend decorator
//!
//! The host does not know at build time whether a process bridge is present.
//! [`FallbackBackend`] tries the primary backend and, on the first failure,
//! logs the switch and serves every later call from the secondary.

use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;

use super::backend::KeyValueBackend;
use crate::error::SettingsResult;
use crate::models::SettingsMap;

pub struct FallbackBackend {
    primary: Box<dyn KeyValueBackend>,
    secondary: Box<dyn KeyValueBackend>,
    degraded: AtomicBool,
}

impl FallbackBackend {
    pub fn new(primary: Box<dyn KeyValueBackend>, secondary: Box<dyn KeyValueBackend>) -> Self {
        Self {
            primary,
            secondary,
            degraded: AtomicBool::new(false),
        }
    }

    /// Whether the primary has failed and the secondary is in use
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    fn degrade(&self, op: &str, err: &dyn std::fmt::Display) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            tracing::warn!(
                primary = self.primary.name(),
                secondary = self.secondary.name(),
                op,
                error = %err,
                "Primary settings backend failed, falling back"
            );
        }
    }
}

impl KeyValueBackend for FallbackBackend {
    fn name(&self) -> &'static str {
        if self.is_degraded() {
            self.secondary.name()
        } else {
            self.primary.name()
        }
    }

    fn get(&self, key: &str) -> SettingsResult<Option<Value>> {
        if !self.is_degraded() {
            match self.primary.get(key) {
                Ok(value) => return Ok(value),
                Err(e) => self.degrade("get", &e),
            }
        }
        self.secondary.get(key)
    }

    fn get_all(&self) -> SettingsResult<SettingsMap> {
        if !self.is_degraded() {
            match self.primary.get_all() {
                Ok(map) => return Ok(map),
                Err(e) => self.degrade("get_all", &e),
            }
        }
        self.secondary.get_all()
    }

    fn set(&mut self, entries: &SettingsMap) -> SettingsResult<()> {
        if !self.is_degraded() {
            match self.primary.set(entries) {
                Ok(()) => return Ok(()),
                Err(e) => self.degrade("set", &e),
            }
        }
        self.secondary.set(entries)
    }

    fn remove(&mut self, key: &str) -> SettingsResult<()> {
        if !self.is_degraded() {
            match self.primary.remove(key) {
                Ok(()) => return Ok(()),
                Err(e) => self.degrade("remove", &e),
            }
        }
        self.secondary.remove(key)
    }

    fn clear(&mut self) -> SettingsResult<()> {
        if !self.is_degraded() {
            match self.primary.clear() {
                Ok(()) => return Ok(()),
                Err(e) => self.degrade("clear", &e),
            }
        }
        self.secondary.clear()
    }
}
