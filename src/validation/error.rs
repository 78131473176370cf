//! Validation error type
//!
//! Each variant renders a human-readable reason; the settings service forwards
//! that text on its error channel.

use serde_json::Value;
use thiserror::Error;

use crate::models::SettingKind;

/// Why a candidate value was rejected
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Unknown setting: {0}")]
    UnknownKey(String),

    #[error("{key} expects a {expected} value, got {actual}")]
    WrongKind {
        key: String,
        expected: SettingKind,
        actual: &'static str,
    },

    #[error("{key} expects a number, got non-numeric text '{text}'")]
    NotNumeric { key: String, text: String },

    #[error("{key} must be at least {min}, got {actual}")]
    BelowMinimum { key: String, min: f64, actual: f64 },

    #[error("{key} must be at most {max}, got {actual}")]
    AboveMaximum { key: String, max: f64, actual: f64 },

    #[error("{key} must be at least {min} characters long, got {len}")]
    TooShort { key: String, min: usize, len: usize },

    #[error("{key} must be at most {max} characters long, got {len}")]
    TooLong { key: String, max: usize, len: usize },

    #[error("{key} needs at least {min} items, got {len}")]
    TooFewItems { key: String, min: usize, len: usize },

    #[error("{key} allows at most {max} items, got {len}")]
    TooManyItems { key: String, max: usize, len: usize },

    #[error("{key} does not allow the value {value}")]
    InvalidChoice { key: String, value: Value },

    #[error("{key} does not match the pattern {pattern}")]
    PatternMismatch { key: String, pattern: String },

    #[error("{key} has an unusable pattern {pattern}: {message}")]
    InvalidPattern {
        key: String,
        pattern: String,
        message: String,
    },

    #[error("{key}: {message}")]
    RuleFailed { key: String, message: String },

    #[error("{key}: dependencies not met ({})", .unmet.join(", "))]
    DependenciesNotMet { key: String, unmet: Vec<String> },
}

impl ValidationError {
    /// Key of the setting that failed
    pub fn key(&self) -> &str {
        match self {
            Self::UnknownKey(key) => key,
            Self::WrongKind { key, .. }
            | Self::NotNumeric { key, .. }
            | Self::BelowMinimum { key, .. }
            | Self::AboveMaximum { key, .. }
            | Self::TooShort { key, .. }
            | Self::TooLong { key, .. }
            | Self::TooFewItems { key, .. }
            | Self::TooManyItems { key, .. }
            | Self::InvalidChoice { key, .. }
            | Self::PatternMismatch { key, .. }
            | Self::InvalidPattern { key, .. }
            | Self::RuleFailed { key, .. }
            | Self::DependenciesNotMet { key, .. } => key,
        }
    }

    pub fn is_unknown_key(&self) -> bool {
        matches!(self, Self::UnknownKey(_))
    }

    pub fn is_dependency(&self) -> bool {
        matches!(self, Self::DependenciesNotMet { .. })
    }
}
