pub mod hash;
pub mod time;
pub mod vars;

use serde_json::Value;

/// Render a scalar the way users wrote it, without JSON quoting.
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Flatten a scalar or list value into its rendered elements.
pub fn value_strings(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(scalar_to_string).collect(),
        Value::Null => Vec::new(),
        other => vec![scalar_to_string(other)],
    }
}
