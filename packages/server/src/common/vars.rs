//! `$name` variable substitution against a request-scoped context.

use serde_json::{Map, Value};

/// The per-request variable context.
pub type Context = Map<String, Value>;

/// Replace `$name` references inside a prompt string.
///
/// Unresolved references are left untouched.
pub fn replace_variables_in_string(input: &str, context: &Context) -> String {
    let mut output = input.to_string();
    for (name, value) in context {
        let needle = format!("${name}");
        let replacement = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        output = output.replace(&needle, &replacement);
    }
    output
}

/// Resolve a whole-string `$name` reference; `None` when the value is not a
/// reference. A reference to a missing variable resolves to `Value::Null`,
/// which suppresses the clause contribution downstream.
pub fn resolve_reference(value: &str, context: &Context) -> Option<Value> {
    let name = value.strip_prefix('$')?;
    Some(context.get(name).cloned().unwrap_or(Value::Null))
}

/// Replace `$name` string values anywhere in a filter tree.
pub fn replace_variables_in_filter(filter: &Value, context: &Context) -> Value {
    match filter {
        Value::Object(map) => {
            let mut replaced = Map::new();
            for (key, value) in map {
                replaced.insert(key.clone(), replace_variables_in_filter(value, context));
            }
            Value::Object(replaced)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| replace_variables_in_filter(item, context))
                .collect(),
        ),
        Value::String(s) => match resolve_reference(s, context) {
            Some(resolved) => resolved,
            None => filter.clone(),
        },
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> Context {
        let Value::Object(map) = json!({ "query": "opel corsa", "year": 2011 }) else {
            unreachable!()
        };
        map
    }

    #[test]
    fn test_replace_in_string() {
        let out = replace_variables_in_string("cars like $query from $year", &context());
        assert_eq!(out, "cars like opel corsa from 2011");
    }

    #[test]
    fn test_unresolved_reference_left_untouched() {
        let out = replace_variables_in_string("cars like $missing", &context());
        assert_eq!(out, "cars like $missing");
    }

    #[test]
    fn test_replace_in_filter_tree() {
        let filter = json!({ "and": [
            { "make": "$query" },
            { "year": { "gte": "$year" } }
        ]});
        let replaced = replace_variables_in_filter(&filter, &context());
        assert_eq!(replaced["and"][0]["make"], "opel corsa");
        assert_eq!(replaced["and"][1]["year"]["gte"], 2011);
    }

    #[test]
    fn test_missing_reference_becomes_null() {
        let filter = json!({ "make": "$nope" });
        let replaced = replace_variables_in_filter(&filter, &context());
        assert_eq!(replaced["make"], Value::Null);
    }
}
