//! Aggregation field configs → function-calling JSON schemas.

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use super::types::{AggregationFieldConfig, EnumSpec};

fn primitive_type(field_type: &str) -> (&'static str, Option<&'static str>) {
    match field_type {
        "string" | "text" => ("string", None),
        "integer" => ("integer", None),
        "float" => ("number", Some("float")),
        "double" => ("number", Some("double")),
        "boolean" => ("boolean", None),
        // `item` fields are asked of the model as free text and resolved to
        // concrete values by the expansion step.
        _ => ("string", None),
    }
}

fn apply_enum(schema: &mut Map<String, Value>, enum_spec: &EnumSpec) {
    match enum_spec {
        EnumSpec::List(values) => {
            schema.insert("enum".into(), json!(values));
        }
        EnumSpec::Map(values) => {
            let keys: Vec<&String> = values.keys().collect();
            schema.insert("enum".into(), json!(keys));

            let descriptions: Vec<String> =
                values.iter().map(|(k, v)| format!("{k} is {v}")).collect();
            let existing = schema
                .get("description")
                .and_then(|d| d.as_str())
                .unwrap_or_default();
            let description = format!(
                "{existing} Possible values: {}",
                descriptions.join(", ")
            );
            schema.insert("description".into(), json!(description.trim()));
        }
    }
}

fn field_schema(config: &AggregationFieldConfig) -> Value {
    let mut schema = Map::new();

    match config.field_type.as_str() {
        "list" => {
            let items = config
                .of
                .as_ref()
                .map(|of| field_schema(of))
                .unwrap_or_else(|| json!({ "type": "string" }));
            schema.insert("type".into(), json!("array"));
            schema.insert("items".into(), items);
            if let Some(description) = &config.description {
                schema.insert("description".into(), json!(description));
            }
            return Value::Object(schema);
        }
        "object" => {
            schema.insert("type".into(), json!("object"));
            let mut properties = Map::new();
            let mut required = Vec::new();
            if let Some(nested) = &config.properties {
                for (name, nested_config) in nested {
                    properties.insert(name.clone(), field_schema(nested_config));
                    if nested_config.required {
                        required.push(name.clone());
                    }
                }
            }
            if !properties.is_empty() {
                schema.insert("properties".into(), Value::Object(properties));
            }
            if !required.is_empty() {
                schema.insert("required".into(), json!(required));
            }
            if let Some(description) = &config.description {
                schema.insert("description".into(), json!(description));
            }
            return Value::Object(schema);
        }
        other => {
            let (json_type, format) = primitive_type(other);
            schema.insert("type".into(), json!(json_type));
            if let Some(format) = format {
                schema.insert("format".into(), json!(format));
            }
            if let Some(description) = &config.description {
                schema.insert("description".into(), json!(description));
            }
            if let Some(enum_spec) = &config.enum_spec {
                apply_enum(&mut schema, enum_spec);
            }
        }
    }

    if config.multiple {
        return json!({ "type": "array", "items": Value::Object(schema) });
    }

    Value::Object(schema)
}

/// The function-call parameter schema of an aggregation's field map.
pub fn fields_to_schema(fields: &IndexMap<String, AggregationFieldConfig>) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for (name, config) in fields {
        properties.insert(name.clone(), field_schema(config));
        if config.required {
            required.push(name.clone());
        }
    }

    let mut schema = Map::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".into(), json!(required));
    }

    Value::Object(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(value: Value) -> IndexMap<String, AggregationFieldConfig> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_primitive_types() {
        let schema = fields_to_schema(&fields(json!({
            "make": { "type": "text", "description": "the make" },
            "year": { "type": "integer" },
            "price": { "type": "float" },
            "active": { "type": "boolean" }
        })));

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["make"]["type"], "string");
        assert_eq!(schema["properties"]["make"]["description"], "the make");
        assert_eq!(schema["properties"]["year"]["type"], "integer");
        assert_eq!(schema["properties"]["price"]["type"], "number");
        assert_eq!(schema["properties"]["price"]["format"], "float");
        assert_eq!(schema["properties"]["active"]["type"], "boolean");
    }

    #[test]
    fn test_item_fields_are_strings() {
        let schema = fields_to_schema(&fields(json!({
            "color": {
                "type": "item",
                "description": "the color",
                "search": { "filter": { "field": "color" }, "export": "value" }
            }
        })));
        assert_eq!(schema["properties"]["color"]["type"], "string");
    }

    #[test]
    fn test_multiple_wraps_in_array() {
        let schema = fields_to_schema(&fields(json!({
            "tags": { "type": "string", "multiple": true }
        })));
        assert_eq!(schema["properties"]["tags"]["type"], "array");
        assert_eq!(schema["properties"]["tags"]["items"]["type"], "string");
    }

    #[test]
    fn test_enum_list() {
        let schema = fields_to_schema(&fields(json!({
            "offertype": { "type": "string", "enum": ["rent", "buy"] }
        })));
        assert_eq!(schema["properties"]["offertype"]["enum"], json!(["rent", "buy"]));
    }

    #[test]
    fn test_enum_map_appends_descriptions() {
        let schema = fields_to_schema(&fields(json!({
            "offertype": {
                "type": "string",
                "description": "the offer type.",
                "enum": { "rent": "a monthly rental", "buy": "a purchase" }
            }
        })));
        assert_eq!(schema["properties"]["offertype"]["enum"], json!(["rent", "buy"]));
        let description = schema["properties"]["offertype"]["description"]
            .as_str()
            .unwrap();
        assert!(description.contains("Possible values: rent is a monthly rental, buy is a purchase"));
    }

    #[test]
    fn test_list_and_object_nesting() {
        let schema = fields_to_schema(&fields(json!({
            "rooms": {
                "type": "list",
                "of": { "type": "integer" }
            },
            "address": {
                "type": "object",
                "properties": {
                    "city": { "type": "string", "required": true },
                    "zip": { "type": "string" }
                }
            }
        })));

        assert_eq!(schema["properties"]["rooms"]["type"], "array");
        assert_eq!(schema["properties"]["rooms"]["items"]["type"], "integer");
        assert_eq!(
            schema["properties"]["address"]["properties"]["city"]["type"],
            "string"
        );
        assert_eq!(schema["properties"]["address"]["required"], json!(["city"]));
    }

    #[test]
    fn test_required_fields_collected() {
        let schema = fields_to_schema(&fields(json!({
            "make": { "type": "text", "required": true },
            "year": { "type": "integer" }
        })));
        assert_eq!(schema["required"], json!(["make"]));
    }
}
