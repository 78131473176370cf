//! Backup record inspection
//!
//! Checks the shape of a serialized backup without importing it.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// Result of inspecting a serialized backup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackupValidation {
    /// Whether the record can be imported
    pub is_valid: bool,
    /// Format version declared by the record
    pub version: Option<String>,
    /// Creation time declared by the record
    pub timestamp: Option<DateTime<Utc>>,
    /// Number of settings in the record
    pub setting_count: usize,
    /// Whether the record carries metadata
    pub has_metadata: bool,
    /// Everything wrong with the record
    pub problems: Vec<String>,
}

impl BackupValidation {
    /// Get a one-line summary of the inspection
    pub fn summary(&self) -> String {
        if self.is_valid {
            format!(
                "Valid backup (v{}): {} settings",
                self.version.as_deref().unwrap_or("?"),
                self.setting_count
            )
        } else {
            format!("Invalid backup: {}", self.problems.join("; "))
        }
    }
}

/// Inspect a serialized backup record
pub fn validate_serialized(serialized: &str) -> BackupValidation {
    let mut result = BackupValidation::default();

    let raw: Value = match serde_json::from_str(serialized) {
        Ok(raw) => raw,
        Err(e) => {
            result.problems.push(format!("not valid JSON: {}", e));
            return result;
        }
    };
    let Some(record) = raw.as_object() else {
        result.problems.push("record is not an object".into());
        return result;
    };

    match record.get("settings") {
        Some(Value::Object(settings)) => result.setting_count = settings.len(),
        Some(_) => result.problems.push("settings is not an object".into()),
        None => result.problems.push("missing settings".into()),
    }

    match record.get("version") {
        Some(Value::String(version)) => result.version = Some(version.clone()),
        Some(_) => result.problems.push("version is not a string".into()),
        None => result.problems.push("missing version".into()),
    }

    match record.get("timestamp") {
        Some(Value::Number(n)) => {
            result.timestamp = n
                .as_i64()
                .and_then(|millis| Utc.timestamp_millis_opt(millis).single());
            if result.timestamp.is_none() {
                result.problems.push("timestamp is out of range".into());
            }
        }
        Some(_) => result.problems.push("timestamp is not a number".into()),
        None => result.problems.push("missing timestamp".into()),
    }

    match record.get("metadata") {
        None | Some(Value::Null) => {}
        Some(Value::Object(_)) => result.has_metadata = true,
        Some(_) => result.problems.push("metadata is not an object".into()),
    }

    result.is_valid = result.problems.is_empty();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_record() {
        let result = validate_serialized(
            r#"{"id": "x", "timestamp": 1700000000000, "version": "1.0.0", "settings": {"a": 1, "b": 2}}"#,
        );
        assert!(result.is_valid);
        assert_eq!(result.setting_count, 2);
        assert_eq!(result.version.as_deref(), Some("1.0.0"));
        assert!(!result.has_metadata);
        assert!(result.summary().contains("Valid backup"));
    }

    #[test]
    fn test_collects_every_problem() {
        let result = validate_serialized(r#"{"timestamp": "yesterday", "settings": []}"#);
        assert!(!result.is_valid);
        assert_eq!(result.problems.len(), 3);
        assert!(result.summary().starts_with("Invalid backup"));
    }

    #[test]
    fn test_not_json() {
        let result = validate_serialized("[1, 2");
        assert!(!result.is_valid);
        assert!(result.problems[0].starts_with("not valid JSON"));

        let result = validate_serialized("[]");
        assert_eq!(result.problems, vec!["record is not an object".to_string()]);
    }
}
