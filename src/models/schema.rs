//! Setting schema descriptors
//!
//! A schema is the static description of one setting: its kind, default,
//! label, bounds, choices, dependencies and validation rules. Schemas are
//! supplied by the host application and never mutated once registered.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::value::{normalize, SettingsMap};

/// The kind of value a setting holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingKind {
    /// Free-form text
    Text,
    /// Integer or floating-point number
    Number,
    /// On/off switch
    Boolean,
    /// One value out of an enumerated set
    Choice,
    /// Ordered list of values
    List,
    /// Structured object
    Object,
}

impl fmt::Display for SettingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingKind::Text => write!(f, "text"),
            SettingKind::Number => write!(f, "number"),
            SettingKind::Boolean => write!(f, "boolean"),
            SettingKind::Choice => write!(f, "choice"),
            SettingKind::List => write!(f, "list"),
            SettingKind::Object => write!(f, "object"),
        }
    }
}

/// One enumerated option of a choice setting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub value: Value,
    pub label: String,
}

impl ChoiceOption {
    pub fn new(value: impl Into<Value>, label: impl Into<String>) -> Self {
        Self {
            value: normalize(value.into()),
            label: label.into(),
        }
    }
}

/// A user-supplied predicate for checks the closed rule set cannot express
#[derive(Clone, Copy)]
pub struct CustomRule {
    /// Name shown in logs and debug output
    pub name: &'static str,
    /// Returns the rejection message on failure
    pub check: fn(&Value) -> Result<(), String>,
}

impl fmt::Debug for CustomRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomRule").field("name", &self.name).finish()
    }
}

/// Extra validation applied after the kind and bounds checks
///
/// Every variant except `Custom` is plain data, so rule sets can be inspected
/// and serialized along with the schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Rule {
    /// Inclusive numeric range
    Range { min: Option<f64>, max: Option<f64> },
    /// Inclusive length range (characters for text, items for lists)
    Length {
        min: Option<usize>,
        max: Option<usize>,
    },
    /// Text must match the regular expression
    Pattern { pattern: String },
    /// Value must equal one of the listed values
    OneOf { values: Vec<Value> },
    /// Every inner rule must pass
    All { rules: Vec<Rule> },
    /// At least one inner rule must pass
    Any { rules: Vec<Rule> },
    /// Opaque predicate, not serialized
    #[serde(skip)]
    Custom(CustomRule),
}

impl Rule {
    /// Shorthand for a pattern rule
    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
        }
    }

    /// Shorthand for a custom predicate rule
    pub fn custom(name: &'static str, check: fn(&Value) -> Result<(), String>) -> Self {
        Self::Custom(CustomRule { name, check })
    }

    /// Whether this rule (or any nested rule) is a custom predicate
    pub fn is_custom(&self) -> bool {
        match self {
            Rule::Custom(_) => true,
            Rule::All { rules } | Rule::Any { rules } => rules.iter().any(Rule::is_custom),
            _ => false,
        }
    }
}

/// Static descriptor of one setting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingSchema {
    /// Unique key, e.g. `editor.fontSize`
    pub key: String,

    /// Value kind
    pub kind: SettingKind,

    /// Value used when nothing is stored
    pub default: Value,

    /// Human label
    pub label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Owning category id, stamped by category registration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Lower bound: value for numbers, characters for text, items for lists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Upper bound, same interpretation as `min`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    /// Enumerated choices for `Choice` settings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<ChoiceOption>,

    /// Other settings that must hold exactly these values before this one
    /// can be written
    #[serde(default, skip_serializing_if = "SettingsMap::is_empty")]
    pub depends_on: SettingsMap,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,

    #[serde(default)]
    pub experimental: bool,

    /// Changing this setting takes effect only after an application restart
    #[serde(default)]
    pub requires_restart: bool,

    /// The presentation layer applies this setting directly (e.g. CSS vars)
    #[serde(default)]
    pub apply_directly: bool,
}

impl SettingSchema {
    /// Create a schema of the given kind
    pub fn new(
        key: impl Into<String>,
        kind: SettingKind,
        label: impl Into<String>,
        default: impl Into<Value>,
    ) -> Self {
        Self {
            key: key.into(),
            kind,
            default: normalize(default.into()),
            label: label.into(),
            description: None,
            category: None,
            min: None,
            max: None,
            choices: Vec::new(),
            depends_on: SettingsMap::new(),
            rules: Vec::new(),
            experimental: false,
            requires_restart: false,
            apply_directly: false,
        }
    }

    pub fn text(key: impl Into<String>, label: impl Into<String>, default: &str) -> Self {
        Self::new(key, SettingKind::Text, label, default)
    }

    pub fn number(key: impl Into<String>, label: impl Into<String>, default: f64) -> Self {
        Self::new(key, SettingKind::Number, label, default)
    }

    pub fn boolean(key: impl Into<String>, label: impl Into<String>, default: bool) -> Self {
        Self::new(key, SettingKind::Boolean, label, default)
    }

    /// Create a choice schema; the default should be one of `options`
    pub fn choice(
        key: impl Into<String>,
        label: impl Into<String>,
        default: impl Into<Value>,
        options: Vec<ChoiceOption>,
    ) -> Self {
        let mut schema = Self::new(key, SettingKind::Choice, label, default);
        schema.choices = options;
        schema
    }

    pub fn list(key: impl Into<String>, label: impl Into<String>, default: Vec<Value>) -> Self {
        Self::new(key, SettingKind::List, label, Value::Array(default))
    }

    pub fn object(key: impl Into<String>, label: impl Into<String>, default: SettingsMap) -> Self {
        Self::new(key, SettingKind::Object, label, Value::Object(default))
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    /// Require `key` to hold exactly `value` before this setting can be set
    pub fn depends_on(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.depends_on.insert(key.into(), normalize(value.into()));
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn experimental(mut self) -> Self {
        self.experimental = true;
        self
    }

    pub fn requires_restart(mut self) -> Self {
        self.requires_restart = true;
        self
    }

    pub fn apply_directly(mut self) -> Self {
        self.apply_directly = true;
        self
    }

    /// Whether writes to this setting are gated on other settings
    pub fn has_dependencies(&self) -> bool {
        !self.depends_on.is_empty()
    }

    /// Whether `value` is one of the enumerated choices
    pub fn allows_choice(&self, value: &Value) -> bool {
        self.choices.iter().any(|option| &option.value == value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_sets_bounds_and_flags() {
        let schema = SettingSchema::number("editor.fontSize", "Font size", 14.0)
            .min(8.0)
            .max(32.0)
            .requires_restart();

        assert_eq!(schema.kind, SettingKind::Number);
        assert_eq!(schema.default, json!(14));
        assert_eq!(schema.min, Some(8.0));
        assert_eq!(schema.max, Some(32.0));
        assert!(schema.requires_restart);
        assert!(!schema.experimental);
    }

    #[test]
    fn test_choice_membership() {
        let schema = SettingSchema::choice(
            "appearance.theme",
            "Theme",
            "dark",
            vec![ChoiceOption::new("light", "Light"), ChoiceOption::new("dark", "Dark")],
        );

        assert!(schema.allows_choice(&json!("light")));
        assert!(!schema.allows_choice(&json!("solarized")));
    }

    #[test]
    fn test_dependencies() {
        let schema = SettingSchema::text("ai.model", "Model", "small").depends_on("ai.enabled", true);
        assert!(schema.has_dependencies());
        assert_eq!(schema.depends_on.get("ai.enabled"), Some(&json!(true)));
    }

    #[test]
    fn test_schema_serialization_skips_custom_rules() {
        let schema = SettingSchema::text("sync.url", "Sync URL", "")
            .rule(Rule::pattern("^https?://"))
            .rule(Rule::Length {
                min: None,
                max: Some(200),
            });

        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["rules"][0]["rule"], "pattern");
        assert_eq!(json["kind"], "text");

        let back: SettingSchema = serde_json::from_value(json).unwrap();
        assert_eq!(back.rules.len(), 2);
    }

    #[test]
    fn test_is_custom_nested() {
        let rule = Rule::All {
            rules: vec![Rule::custom("even", |_| Ok(()))],
        };
        assert!(rule.is_custom());
        assert!(!Rule::pattern("x").is_custom());
    }
}
