//! Lenient accessors for model-produced JSON.
//!
//! Agents are told what shape to return and frequently return something
//! close to it: numbers as strings, a single item where a list was asked for,
//! the string "null" where a null was meant. These helpers read such values
//! without failing.

use serde_json::Value;

/// A non-empty trimmed string. `"null"` and `"none"` read as absent.
pub fn as_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim(),
        Value::Number(n) => return Some(n.to_string()),
        _ => return None,
    };
    if text.is_empty() || text.eq_ignore_ascii_case("null") || text.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(text.to_string())
    }
}

/// An integer, from a number (truncated) or a numeric string.
pub fn as_int(value: &Value) -> Option<i32> {
    let n = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?,
        Value::String(s) => {
            let s = s.trim().trim_start_matches('+');
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))?
        }
        _ => return None,
    };
    Some(n.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
}

/// A boolean, from a bool or a "true"/"yes"/"false"/"no" string.
pub fn as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// The elements of an array, a lone value as a one-element list, or nothing.
pub fn as_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// Look up `key` and read it as text.
pub fn text_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(as_text)
}

/// Look up `key` and read it as an integer.
pub fn int_field(value: &Value, key: &str) -> Option<i32> {
    value.get(key).and_then(as_int)
}
