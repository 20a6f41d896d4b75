//! Loosely-typed property maps.
//!
//! Property panels and documents exchange values as JSON. Numbers may arrive
//! as strings ("12", " 3.5 "); the helpers here accept both. A value that
//! cannot be coerced is ignored by the caller, leaving the field unchanged.

use serde_json::Value;

use crate::color::Color;

/// A map of property name to value.
pub type PropertyMap = serde_json::Map<String, Value>;

/// A number, or a string holding one.
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// A string; numbers and booleans are rendered to their text form.
pub fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A boolean, `"true"`/`"false"`, or a number (non-zero is true).
pub fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        _ => None,
    }
}

/// A hex color string.
pub fn coerce_color(value: &Value) -> Option<Color> {
    match value {
        Value::String(s) => Color::from_hex(s).ok(),
        _ => None,
    }
}

/// Serialize a number, dropping a trailing `.0` for whole values.
pub fn number_value(v: f64) -> Value {
    if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Value::from(v as i64)
    } else {
        serde_json::Number::from_f64(v)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Apply `value` to `target` when it coerces, logging when it does not.
pub(crate) fn assign<T>(
    target: &mut T,
    key: &str,
    value: &Value,
    coerce: impl FnOnce(&Value) -> Option<T>,
) {
    match coerce(value) {
        Some(v) => *target = v,
        None => tracing::debug!(key, value = %value, "Ignoring property value that does not coerce"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_from_strings() {
        assert_eq!(coerce_number(&json!(12)), Some(12.0));
        assert_eq!(coerce_number(&json!(" 3.5 ")), Some(3.5));
        assert_eq!(coerce_number(&json!("abc")), None);
        assert_eq!(coerce_number(&json!(null)), None);
        assert_eq!(coerce_number(&json!("NaN")), None);
    }

    #[test]
    fn test_bools() {
        assert_eq!(coerce_bool(&json!(true)), Some(true));
        assert_eq!(coerce_bool(&json!("false")), Some(false));
        assert_eq!(coerce_bool(&json!(0)), Some(false));
        assert_eq!(coerce_bool(&json!("maybe")), None);
    }

    #[test]
    fn test_number_value_prefers_integers() {
        assert_eq!(number_value(40.0), json!(40));
        assert_eq!(number_value(0.5), json!(0.5));
    }

    #[test]
    fn test_assign_keeps_value_on_bad_input() {
        let mut size = 24.0;
        assign(&mut size, "fontSize", &json!("huge"), coerce_number);
        assert_eq!(size, 24.0);
        assign(&mut size, "fontSize", &json!("32"), coerce_number);
        assert_eq!(size, 32.0);
    }
}
