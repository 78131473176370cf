//! Evaluation of the closed rule set

use std::collections::HashMap;

use regex::Regex;
use serde_json::Value;

use super::error::ValidationError;
use crate::models::Rule;

/// Compiled pattern rules, keyed by their source text
///
/// Patterns that fail to compile are not stored; checking against them
/// reports `InvalidPattern` each time.
#[derive(Debug, Clone, Default)]
pub struct PatternCache {
    compiled: HashMap<String, Regex>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile every pattern in `rules`, nested ones included
    pub fn compile_rules(&mut self, rules: &[Rule]) {
        for rule in rules {
            match rule {
                Rule::Pattern { pattern } if !self.compiled.contains_key(pattern) => {
                    if let Ok(regex) = Regex::new(pattern) {
                        self.compiled.insert(pattern.clone(), regex);
                    }
                }
                Rule::All { rules } | Rule::Any { rules } => self.compile_rules(rules),
                _ => {}
            }
        }
    }

    pub fn get(&self, pattern: &str) -> Option<&Regex> {
        self.compiled.get(pattern)
    }
}

/// Check `value` against a single rule, compiling patterns as needed
pub fn check_rule(key: &str, rule: &Rule, value: &Value) -> Result<(), ValidationError> {
    check_rule_with(key, rule, value, &PatternCache::default())
}

/// Check `value` against a single rule, reusing compiled patterns
pub fn check_rule_with(
    key: &str,
    rule: &Rule,
    value: &Value,
    patterns: &PatternCache,
) -> Result<(), ValidationError> {
    match rule {
        Rule::Range { min, max } => {
            let actual = value.as_f64().ok_or_else(|| ValidationError::RuleFailed {
                key: key.to_string(),
                message: "range rule needs a numeric value".into(),
            })?;
            check_range(key, actual, *min, *max)
        }
        Rule::Length { min, max } => {
            let len = measure(value).ok_or_else(|| ValidationError::RuleFailed {
                key: key.to_string(),
                message: "length rule needs text, a list or an object".into(),
            })?;
            if let Some(min) = *min {
                if len < min {
                    return Err(ValidationError::TooShort {
                        key: key.to_string(),
                        min,
                        len,
                    });
                }
            }
            if let Some(max) = *max {
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
        Rule::Pattern { pattern } => {
            let compiled;
            let regex = match patterns.get(pattern) {
                Some(regex) => regex,
                None => {
                    compiled = Regex::new(pattern).map_err(|e| ValidationError::InvalidPattern {
                        key: key.to_string(),
                        pattern: pattern.clone(),
                        message: e.to_string(),
                    })?;
                    &compiled
                }
            };
            match value.as_str() {
                Some(text) if regex.is_match(text) => Ok(()),
                _ => Err(ValidationError::PatternMismatch {
                    key: key.to_string(),
                    pattern: pattern.clone(),
                }),
            }
        }
        Rule::OneOf { values } => {
            if values.contains(value) {
                Ok(())
            } else {
                Err(ValidationError::InvalidChoice {
                    key: key.to_string(),
                    value: value.clone(),
                })
            }
        }
        Rule::All { rules } => rules
            .iter()
            .try_for_each(|r| check_rule_with(key, r, value, patterns)),
        Rule::Any { rules } => {
            if rules.is_empty()
                || rules
                    .iter()
                    .any(|r| check_rule_with(key, r, value, patterns).is_ok())
            {
                Ok(())
            } else {
                Err(ValidationError::RuleFailed {
                    key: key.to_string(),
                    message: "value matched none of the allowed alternatives".into(),
                })
            }
        }
        Rule::Custom(custom) => (custom.check)(value).map_err(|message| {
            ValidationError::RuleFailed {
                key: key.to_string(),
                message,
            }
        }),
    }
}

/// Inclusive numeric bounds check
pub fn check_range(
    key: &str,
    actual: f64,
    min: Option<f64>,
    max: Option<f64>,
) -> Result<(), ValidationError> {
    if let Some(min) = min {
        if actual < min {
            return Err(ValidationError::BelowMinimum {
                key: key.to_string(),
                min,
                actual,
            });
        }
    }
    if let Some(max) = max {
        if actual > max {
            return Err(ValidationError::AboveMaximum {
                key: key.to_string(),
                max,
                actual,
            });
        }
    }
    Ok(())
}

fn measure(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        Value::Object(map) => Some(map.len()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pattern_rule() {
        let rule = Rule::pattern(r"^#[0-9a-f]{6}$");
        assert!(check_rule("accent", &rule, &json!("#a1b2c3")).is_ok());
        assert!(matches!(
            check_rule("accent", &rule, &json!("red")),
            Err(ValidationError::PatternMismatch { .. })
        ));
        assert!(matches!(
            check_rule("accent", &Rule::pattern("("), &json!("x")),
            Err(ValidationError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_pattern_cache_compiles_nested_rules() {
        let rules = vec![
            Rule::pattern("^[a-z]+$"),
            Rule::Any {
                rules: vec![Rule::pattern(r"^\d+$"), Rule::pattern("(")],
            },
        ];
        let mut cache = PatternCache::new();
        cache.compile_rules(&rules);

        assert!(cache.get("^[a-z]+$").is_some());
        assert!(cache.get(r"^\d+$").is_some());
        assert!(cache.get("(").is_none());

        assert!(check_rule_with("k", &rules[1], &json!("42"), &cache).is_ok());
        assert!(matches!(
            check_rule_with("k", &Rule::pattern("("), &json!("x"), &cache),
            Err(ValidationError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_any_and_all() {
        let rule = Rule::Any {
            rules: vec![
                Rule::OneOf {
                    values: vec![json!("auto")],
                },
                Rule::Range {
                    min: Some(0.0),
                    max: Some(10.0),
                },
            ],
        };
        assert!(check_rule("k", &rule, &json!("auto")).is_ok());
        assert!(check_rule("k", &rule, &json!(5)).is_ok());
        assert!(check_rule("k", &rule, &json!(11)).is_err());

        let rule = Rule::All {
            rules: vec![
                Rule::Length {
                    min: Some(2),
                    max: None,
                },
                Rule::pattern("^[a-z]+$"),
            ],
        };
        assert!(check_rule("k", &rule, &json!("ab")).is_ok());
        assert!(check_rule("k", &rule, &json!("a")).is_err());
        assert!(check_rule("k", &rule, &json!("AB")).is_err());
    }

    #[test]
    fn test_custom_rule_message() {
        let rule = Rule::custom("even", |v| match v.as_i64() {
            Some(n) if n % 2 == 0 => Ok(()),
            _ => Err("must be even".into()),
        });
        assert!(check_rule("k", &rule, &json!(4)).is_ok());
        assert_eq!(
            check_rule("k", &rule, &json!(3)).unwrap_err().to_string(),
            "k: must be even"
        );
    }

    #[test]
    fn test_range_inclusive() {
        assert!(check_range("k", 8.0, Some(8.0), Some(32.0)).is_ok());
        assert!(check_range("k", 32.0, Some(8.0), Some(32.0)).is_ok());
        assert!(check_range("k", 7.0, Some(8.0), Some(32.0)).is_err());
        assert!(check_range("k", 33.0, Some(8.0), Some(32.0)).is_err());
    }
}
