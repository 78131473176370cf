//! Setting values and the ordered settings map

use serde_json::{Number, Value};

/// Ordered mapping from setting key to value (insertion order is kept)
pub type SettingsMap = serde_json::Map<String, Value>;

/// Normalize a value so that equal numbers compare equal
///
/// `serde_json` keeps `14` and `14.0` as different representations. Integral
/// floats are folded into integers, recursively through lists and objects.
pub fn normalize(value: Value) -> Value {
    match value {
        Value::Number(n) => Value::Number(normalize_number(n)),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, normalize(v))).collect()),
        other => other,
    }
}

fn normalize_number(n: Number) -> Number {
    if n.is_i64() || n.is_u64() {
        return n;
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
            Number::from(f as i64)
        }
        _ => n,
    }
}

/// Build a JSON number from a float, folding integral values
pub fn number_value(f: f64) -> Option<Value> {
    Number::from_f64(f).map(|n| Value::Number(normalize_number(n)))
}

/// Short type name used in error messages
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "text",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integral_float_folds_to_integer() {
        assert_eq!(normalize(json!(14.0)), json!(14));
        assert_eq!(normalize(json!(1.5)), json!(1.5));
    }

    #[test]
    fn test_normalize_recurses() {
        let value = normalize(json!({"sizes": [12.0, 14.5], "nested": {"n": 3.0}}));
        assert_eq!(value, json!({"sizes": [12, 14.5], "nested": {"n": 3}}));
    }

    #[test]
    fn test_number_value_rejects_nan() {
        assert!(number_value(f64::NAN).is_none());
        assert_eq!(number_value(2.0), Some(json!(2)));
    }
}
