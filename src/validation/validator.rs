//! Schema-driven value validation
//!
//! Checks run in a fixed order: unknown key, kind (with numeric-text
//! coercion), bounds, declarative rules, custom rules. Dependency checks, when
//! requested, run before all of them.

use std::collections::BTreeMap;

use serde_json::Value;

use super::error::ValidationError;
use super::rules::{check_range, check_rule_with, PatternCache};
use crate::models::value::{number_value, type_name};
use crate::models::{normalize, SettingKind, SettingSchema, SettingsMap};
use crate::registry::SchemaRegistry;

/// Outcome of validating a whole value map
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// True when no key failed
    pub valid: bool,
    /// Every failure, keyed by setting
    pub errors: BTreeMap<String, ValidationError>,
    /// Normalized values for the keys that passed
    pub values: SettingsMap,
}

impl ValidationReport {
    /// Error messages keyed by setting
    pub fn messages(&self) -> BTreeMap<String, String> {
        self.errors
            .iter()
            .map(|(k, e)| (k.clone(), e.to_string()))
            .collect()
    }
}

/// Validates candidate values against the registered schemas
pub struct Validator<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> Validator<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Validate `value` for `key`, returning the normalized value
    pub fn validate(&self, key: &str, value: &Value) -> Result<Value, ValidationError> {
        let schema = self.schema(key)?;
        validate_schema_with(schema, value, self.registry.patterns())
    }

    /// Like [`validate`](Self::validate), but first requires every declared
    /// dependency to hold in `snapshot`
    pub fn validate_with_dependencies(
        &self,
        key: &str,
        value: &Value,
        snapshot: &SettingsMap,
    ) -> Result<Value, ValidationError> {
        let schema = self.schema(key)?;
        let unmet = self.unmet_dependencies(schema, snapshot);
        if !unmet.is_empty() {
            return Err(ValidationError::DependenciesNotMet {
                key: key.to_string(),
                unmet,
            });
        }
        validate_schema_with(schema, value, self.registry.patterns())
    }

    /// Whether every dependency of `key` is satisfied by `snapshot`
    pub fn dependencies_met(&self, key: &str, snapshot: &SettingsMap) -> bool {
        self.registry
            .schema(key)
            .is_some_and(|schema| self.unmet_dependencies(schema, snapshot).is_empty())
    }

    /// Validate every registered schema against `values`, collecting all
    /// failures instead of stopping at the first
    ///
    /// Keys missing from `values` are checked using their schema default.
    pub fn validate_all(&self, values: &SettingsMap) -> ValidationReport {
        let mut report = ValidationReport::default();

        for schema in self.registry.schemas() {
            let candidate = values.get(&schema.key).unwrap_or(&schema.default);
            match validate_schema_with(schema, candidate, self.registry.patterns()) {
                Ok(normalized) => {
                    report.values.insert(schema.key.clone(), normalized);
                }
                Err(err) => {
                    report.errors.insert(schema.key.clone(), err);
                }
            }
        }

        report.valid = report.errors.is_empty();
        report
    }

    fn schema(&self, key: &str) -> Result<&'a SettingSchema, ValidationError> {
        self.registry
            .schema(key)
            .ok_or_else(|| ValidationError::UnknownKey(key.to_string()))
    }

    /// Dependency keys whose current value differs from the required one
    ///
    /// A key absent from `snapshot` is compared using its own schema default.
    fn unmet_dependencies(&self, schema: &SettingSchema, snapshot: &SettingsMap) -> Vec<String> {
        schema
            .depends_on
            .iter()
            .filter(|(dep_key, required)| {
                let current = snapshot
                    .get(dep_key.as_str())
                    .cloned()
                    .or_else(|| self.registry.schema(dep_key).map(|s| s.default.clone()));
                current.map(normalize).as_ref() != Some(*required)
            })
            .map(|(dep_key, _)| dep_key.clone())
            .collect()
    }
}

/// Validate a value against a single schema
pub fn validate_schema(schema: &SettingSchema, value: &Value) -> Result<Value, ValidationError> {
    validate_schema_with(schema, value, &PatternCache::default())
}

fn validate_schema_with(
    schema: &SettingSchema,
    value: &Value,
    patterns: &PatternCache,
) -> Result<Value, ValidationError> {
    let key = schema.key.as_str();
    let value = coerce_kind(schema, normalize(value.clone()))?;

    check_bounds(schema, &value)?;

    for rule in schema.rules.iter().filter(|r| !r.is_custom()) {
        check_rule_with(key, rule, &value, patterns)?;
    }
    for rule in schema.rules.iter().filter(|r| r.is_custom()) {
        check_rule_with(key, rule, &value, patterns)?;
    }

    Ok(value)
}

fn coerce_kind(schema: &SettingSchema, value: Value) -> Result<Value, ValidationError> {
    let key = schema.key.as_str();
    let wrong_kind = |value: &Value| ValidationError::WrongKind {
        key: key.to_string(),
        expected: schema.kind,
        actual: type_name(value),
    };

    match schema.kind {
        SettingKind::Text if value.is_string() => Ok(value),
        SettingKind::Boolean if value.is_boolean() => Ok(value),
        SettingKind::List if value.is_array() => Ok(value),
        SettingKind::Object => Ok(value),
        SettingKind::Number => match value {
            Value::Number(_) => Ok(value),
            Value::String(ref text) => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .and_then(number_value)
                .ok_or_else(|| ValidationError::NotNumeric {
                    key: key.to_string(),
                    text: text.clone(),
                }),
            other => Err(wrong_kind(&other)),
        },
        SettingKind::Choice => {
            if schema.choices.is_empty() || schema.allows_choice(&value) {
                Ok(value)
            } else {
                Err(ValidationError::InvalidChoice {
                    key: key.to_string(),
                    value,
                })
            }
        }
        _ => Err(wrong_kind(&value)),
    }
}

fn check_bounds(schema: &SettingSchema, value: &Value) -> Result<(), ValidationError> {
    let key = schema.key.as_str();
    let (min, max) = (schema.min, schema.max);
    if min.is_none() && max.is_none() {
        return Ok(());
    }

    match (schema.kind, value) {
        (SettingKind::Number, Value::Number(n)) => {
            let actual = n.as_f64().unwrap_or_default();
            check_range(key, actual, min, max)
        }
        (SettingKind::Text, Value::String(text)) => {
            let len = text.chars().count();
            if let Some(min) = min.map(bound_to_len) {
                if len < min {
                    return Err(ValidationError::TooShort {
                        key: key.to_string(),
                        min,
                        len,
                    });
                }
            }
            if let Some(max) = max.map(bound_to_len) {
                if len > max {
                    return Err(ValidationError::TooLong {
                        key: key.to_string(),
                        max,
                        len,
                    });
                }
            }
            Ok(())
        }
        (SettingKind::List, Value::Array(items)) => {
            let len = items.len();
            if let Some(min) = min.map(bound_to_len) {
                if len < min {
                    return Err(ValidationError::TooFewItems {
                        key: key.to_string(),
                        min,
                        len,
                    });
                }
            }
            if let Some(max) = max.map(bound_to_len) {
                if len > max {
                    return Err(ValidationError::TooManyItems {
                        key: key.to_string(),
                        max,
                        len,
                    });
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn bound_to_len(bound: f64) -> usize {
    if bound <= 0.0 {
        0
    } else {
        bound as usize
    }
}
