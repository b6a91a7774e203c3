//! Suggestion and autocomplete types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::aggregate::types::AggregationConfig;
use crate::common::hash::canonical_json;
use crate::search::types::SearchConfig;

/// One snippet source feeding the autocomplete prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoCompleteContext {
    #[serde(rename = "type")]
    pub context_type: String,

    #[serde(default)]
    pub context_title: Option<String>,

    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoCompleteConfig {
    pub query: String,

    #[serde(default)]
    pub extra_info: Option<String>,

    #[serde(default)]
    pub contexts: Vec<AutoCompleteContext>,

    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestSearchConfig {
    pub collection: String,

    #[serde(flatten)]
    pub config: SearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestAggregateConfig {
    pub collection: String,

    #[serde(flatten)]
    pub config: AggregationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestAutocompleteConfig {
    pub collection: String,

    #[serde(flatten)]
    pub config: AutoCompleteConfig,
}

fn default_suggest_limit() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestConfig {
    #[serde(default)]
    pub autocomplete: Option<SuggestAutocompleteConfig>,

    #[serde(default)]
    pub search: Option<SuggestSearchConfig>,

    #[serde(default)]
    pub aggregate: Option<SuggestAggregateConfig>,

    #[serde(default = "default_suggest_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(rename = "type")]
    pub suggestion_type: String,

    #[serde(default)]
    pub aggregation_name: Option<String>,

    #[serde(default)]
    pub item_id: Option<String>,

    #[serde(default)]
    pub fields: Option<Map<String, Value>>,

    #[serde(default)]
    pub score: Option<f64>,
}

impl Suggestion {
    /// Suggestions are the same when their field maps are structurally
    /// equal, regardless of key order.
    pub fn is_same(&self, other: &Suggestion) -> bool {
        let a = self.fields.clone().map(Value::Object).unwrap_or(Value::Null);
        let b = other.fields.clone().map(Value::Object).unwrap_or(Value::Null);
        canonical_json(&a) == canonical_json(&b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn suggestion(fields: Value) -> Suggestion {
        Suggestion {
            suggestion_type: "search".into(),
            aggregation_name: None,
            item_id: None,
            fields: fields.as_object().cloned(),
            score: None,
        }
    }

    #[test]
    fn test_is_same_ignores_key_order() {
        let a = suggestion(json!({ "make": "opel", "model": "corsa" }));
        let b = suggestion(json!({ "model": "corsa", "make": "opel" }));
        assert!(a.is_same(&b));
    }

    #[test]
    fn test_is_same_differs_on_values() {
        let a = suggestion(json!({ "make": "opel" }));
        let b = suggestion(json!({ "make": "bmw" }));
        assert!(!a.is_same(&b));
    }

    #[test]
    fn test_suggest_config_defaults() {
        let config: SuggestConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config.limit, 1);
        assert!(config.search.is_none());
    }

    #[test]
    fn test_flattened_search_source() {
        let config: SuggestConfig = serde_json::from_value(json!({
            "search": {
                "collection": "cars",
                "similar": { "of": [{ "text": "opel" }] },
                "limit": 3
            }
        }))
        .unwrap();
        let search = config.search.unwrap();
        assert_eq!(search.collection, "cars");
        assert_eq!(search.config.limit, 3);
    }
}
