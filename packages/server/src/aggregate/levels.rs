//! Field dependency resolution.
//!
//! An `item` field depends on another field when its filter references it
//! via `$name`. Kahn's algorithm groups fields into execution levels; every
//! field in one level is independent of the others in it.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use serde_json::Value;

use super::types::AggregationFieldConfig;
use crate::error::{Error, Result};

fn collect_references(value: &Value, references: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            for nested in map.values() {
                collect_references(nested, references);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, references);
            }
        }
        Value::String(s) => {
            if let Some(name) = s.strip_prefix('$') {
                references.insert(name.to_string());
            }
        }
        _ => {}
    }
}

/// Group fields into dependency levels, respecting every `$ref` edge.
/// Cyclic configurations are invalid.
pub fn execution_levels(
    fields: &IndexMap<String, AggregationFieldConfig>,
) -> Result<Vec<Vec<String>>> {
    let names: Vec<&String> = fields.keys().collect();

    let mut dependencies: BTreeMap<&String, BTreeSet<String>> = BTreeMap::new();
    for (name, config) in fields {
        let mut references = BTreeSet::new();
        if let Some(search) = &config.search {
            collect_references(&Value::Object(search.filter.clone()), &mut references);
        }
        // Only edges to actual sibling fields count.
        references.retain(|reference| names.iter().any(|n| *n == reference));
        dependencies.insert(name, references);
    }

    let mut levels: Vec<Vec<String>> = Vec::new();
    let mut processed: BTreeSet<String> = BTreeSet::new();

    while processed.len() < fields.len() {
        let mut level: Vec<String> = Vec::new();
        for name in fields.keys() {
            if processed.contains(name) {
                continue;
            }
            let ready = dependencies[name]
                .iter()
                .all(|dependency| processed.contains(dependency));
            if ready {
                level.push(name.clone());
            }
        }

        if level.is_empty() {
            return Err(Error::Config("cyclic dependency between aggregation fields".into()));
        }

        for name in &level {
            processed.insert(name.clone());
        }
        levels.push(level);
    }

    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> IndexMap<String, AggregationFieldConfig> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_independent_fields_in_one_level() {
        let levels = execution_levels(&fields(json!({
            "make": { "type": "text" },
            "model": { "type": "text" }
        })))
        .unwrap();
        assert_eq!(levels, vec![vec!["make".to_string(), "model".to_string()]]);
    }

    #[test]
    fn test_reference_orders_levels() {
        let levels = execution_levels(&fields(json!({
            "model": {
                "type": "item",
                "search": { "filter": { "make": "$make" }, "export": "value" }
            },
            "make": {
                "type": "item",
                "search": { "filter": { "field": "make" }, "export": "value" }
            }
        })))
        .unwrap();
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0], vec!["make".to_string()]);
        assert_eq!(levels[1], vec!["model".to_string()]);
    }

    #[test]
    fn test_nested_references_found() {
        let levels = execution_levels(&fields(json!({
            "area": {
                "type": "item",
                "search": {
                    "filter": { "and": [{ "city": { "eq": "$city" } }] },
                    "export": "value"
                }
            },
            "city": { "type": "text" }
        })))
        .unwrap();
        assert_eq!(levels[0], vec!["city".to_string()]);
        assert_eq!(levels[1], vec!["area".to_string()]);
    }

    #[test]
    fn test_references_to_non_fields_ignored() {
        let levels = execution_levels(&fields(json!({
            "color": {
                "type": "item",
                "search": { "filter": { "query": "$query" }, "export": "value" }
            }
        })))
        .unwrap();
        assert_eq!(levels, vec![vec!["color".to_string()]]);
    }

    #[test]
    fn test_cycle_is_config_error() {
        let result = execution_levels(&fields(json!({
            "a": {
                "type": "item",
                "search": { "filter": { "x": "$b" }, "export": "value" }
            },
            "b": {
                "type": "item",
                "search": { "filter": { "x": "$a" }, "export": "value" }
            }
        })));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
