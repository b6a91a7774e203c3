//! Aggregation request and response types.

use indexmap::IndexMap;
use llm_client::FileInput;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::llm::LlmStats;

fn default_field_type() -> String {
    "text".to_string()
}

fn default_item_limit() -> usize {
    1
}

/// Nested search run to expand an `item`-typed field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSearchConfig {
    #[serde(default)]
    pub filter: Map<String, Value>,

    /// The field of matched items that supplies the possible values.
    pub export: String,

    #[serde(default = "default_item_limit")]
    pub limit: usize,

    #[serde(default)]
    pub distance_function: Option<String>,
}

/// Enum constraint: a list of values, or values with descriptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumSpec {
    List(Vec<String>),
    Map(IndexMap<String, String>),
}

/// One field of an aggregation's function schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationFieldConfig {
    #[serde(rename = "type", default = "default_field_type")]
    pub field_type: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Literal value injected into every result, not asked of the model.
    #[serde(default)]
    pub value: Option<Value>,

    #[serde(default)]
    pub multiple: bool,

    #[serde(default)]
    pub required: bool,

    #[serde(rename = "enum", default)]
    pub enum_spec: Option<EnumSpec>,

    /// For `item` fields: the search expanding them into concrete values.
    #[serde(default)]
    pub search: Option<ItemSearchConfig>,

    /// For `list` fields: the element type.
    #[serde(default)]
    pub of: Option<Box<AggregationFieldConfig>>,

    /// For `object` fields: the nested properties.
    #[serde(default)]
    pub properties: Option<IndexMap<String, AggregationFieldConfig>>,
}

/// One candidate function schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationQuery {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub facts: Vec<String>,

    pub fields: IndexMap<String, AggregationFieldConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationSort {
    pub field: String,

    #[serde(default = "default_sort_order")]
    pub order: String,
}

fn default_sort_order() -> String {
    "asc".to_string()
}

fn default_aggregation_limit() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    pub prompt: String,

    pub aggregations: Vec<AggregationQuery>,

    #[serde(default = "default_aggregation_limit")]
    pub limit: usize,

    #[serde(default)]
    pub sort: Option<AggregationSort>,

    #[serde(default)]
    pub files: Vec<FileInput>,

    #[serde(default)]
    pub heavy_model: Option<String>,

    #[serde(default)]
    pub light_model: Option<String>,

    #[serde(default)]
    pub classification_prompt: Option<String>,

    #[serde(default)]
    pub aggregation_prompt: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeavyAndLightLlmStats {
    pub heavy_llm_stats: LlmStats,
    pub light_llm_stats: LlmStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationResult {
    pub aggregation: String,
    pub items: Vec<Map<String, Value>>,
    pub llm_stats: HeavyAndLightLlmStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_s3_style_config_parses() {
        let config: AggregationConfig = serde_json::from_value(json!({
            "prompt": "red opel corsa up to 3000 euros 2011-2016",
            "heavy_model": "openai:gpt-4o",
            "aggregations": [{
                "name": "test_aggregation",
                "description": "search for cars",
                "fields": {
                    "make": { "type": "text", "description": "the make" },
                    "model": { "type": "text", "description": "the model" },
                    "year": { "type": "integer", "description": "the year" },
                    "price_to": { "type": "integer", "description": "maximum price" },
                    "color": {
                        "type": "item",
                        "description": "the color",
                        "search": {
                            "filter": { "field": "color" },
                            "export": "value",
                            "limit": 1
                        }
                    }
                }
            }]
        }))
        .unwrap();

        assert_eq!(config.limit, 1);
        let aggregation = &config.aggregations[0];
        // Field order is preserved for schema generation and expansion.
        let names: Vec<&String> = aggregation.fields.keys().collect();
        assert_eq!(names, ["make", "model", "year", "price_to", "color"]);

        let color = &aggregation.fields["color"];
        assert_eq!(color.field_type, "item");
        assert_eq!(color.search.as_ref().unwrap().export, "value");
        assert_eq!(color.search.as_ref().unwrap().limit, 1);
    }

    #[test]
    fn test_enum_forms() {
        let field: AggregationFieldConfig = serde_json::from_value(json!({
            "type": "string",
            "enum": ["rent", "buy"]
        }))
        .unwrap();
        assert!(matches!(field.enum_spec, Some(EnumSpec::List(_))));

        let field: AggregationFieldConfig = serde_json::from_value(json!({
            "type": "string",
            "enum": { "rent": "a monthly rental", "buy": "a purchase" }
        }))
        .unwrap();
        assert!(matches!(field.enum_spec, Some(EnumSpec::Map(_))));
    }
}
