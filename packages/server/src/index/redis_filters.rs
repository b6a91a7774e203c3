//! Filter tree and text query → RediSearch query syntax.

use serde_json::{Map, Value};

use crate::common::scalar_to_string;
use crate::index::normalize_field;

/// Render a scalar for a TAG clause. Booleans are indexed as 1/0.
fn tag_value(value: &Value) -> String {
    match value {
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        other => scalar_to_string(other),
    }
}

fn listify(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

fn build_field_query(field: &str, value: &Value) -> String {
    let field = normalize_field(field);

    match value {
        Value::Object(operators) => {
            let mut parts = Vec::new();
            for (op, op_value) in operators {
                match op.as_str() {
                    "gte" | "lte" => {
                        let min = operators
                            .get("gte")
                            .map(scalar_to_string)
                            .unwrap_or_else(|| "-inf".to_string());
                        let max = operators
                            .get("lte")
                            .map(scalar_to_string)
                            .unwrap_or_else(|| "+inf".to_string());
                        let range = format!("@{field}:[{min} {max}]");
                        if !parts.contains(&range) {
                            parts.push(range);
                        }
                    }
                    "eq" => match op_value {
                        Value::Number(n) => parts.push(format!("@{field}:[{n} {n}]")),
                        other => parts.push(format!("@{field}:{{{}}}", tag_value(other))),
                    },
                    "contains" => {
                        // All-of: every value must be present in the tag list.
                        let clauses: Vec<String> = listify(op_value)
                            .iter()
                            .map(|v| format!("@{field}:{{{}}}", tag_value(v)))
                            .collect();
                        parts.push(clauses.join(" "));
                    }
                    "in" => {
                        let clauses: Vec<String> = listify(op_value)
                            .iter()
                            .map(|v| format!("@{field}:{{{}}}", tag_value(v)))
                            .collect();
                        parts.push(format!("({})", clauses.join("|")));
                    }
                    "overlaps" => {
                        // Any-of over a tag list.
                        let values: Vec<String> =
                            listify(op_value).iter().map(tag_value).collect();
                        parts.push(format!("@{field}:{{{}}}", values.join("|")));
                    }
                    "not" => {
                        let nested = build_field_query(&field, op_value);
                        parts.push(format!("-({nested})"));
                    }
                    _ => {}
                }
            }
            parts.join(" ")
        }
        Value::Number(n) => format!("@{field}:[{n} {n}]"),
        scalar => format!("@{field}:{{{}}}", tag_value(scalar)),
    }
}

/// Translate a filter tree into one RediSearch filter expression.
pub fn build_redis_filter(filters: &Map<String, Value>) -> String {
    let mut conditions = Vec::new();

    for (key, value) in filters {
        match key.as_str() {
            "and" => {
                if let Some(subfilters) = value.as_array() {
                    let nested: Vec<String> = subfilters
                        .iter()
                        .filter_map(|f| f.as_object())
                        .map(build_redis_filter)
                        .collect();
                    conditions.push(format!("({})", nested.join(" ")));
                }
            }
            "or" => {
                if let Some(subfilters) = value.as_array() {
                    let nested: Vec<String> = subfilters
                        .iter()
                        .filter_map(|f| f.as_object())
                        .map(build_redis_filter)
                        .collect();
                    conditions.push(format!("({})", nested.join(" | ")));
                }
            }
            "not" => {
                if let Some(map) = value.as_object() {
                    conditions.push(format!("-({})", build_redis_filter(map)));
                }
            }
            field => conditions.push(build_field_query(field, value)),
        }
    }

    conditions.retain(|c| !c.is_empty());
    conditions.join(" ")
}

/// Expand a stemmed text query into weighted fuzzy | exact | prefix
/// subqueries.
pub fn build_text_query(text_query: &str) -> String {
    fn fuzzy_distance(word: &str) -> usize {
        let len = word.chars().count();
        if len <= 4 {
            0
        } else if len <= 7 {
            1
        } else {
            2
        }
    }

    fn fuzzed(word: &str) -> String {
        let wrap = "%".repeat(fuzzy_distance(word));
        format!("{wrap}{word}{wrap}")
    }

    let words: Vec<&str> = text_query.split_whitespace().collect();

    let weighted: Vec<(String, f64)> = if words.len() > 1 {
        let fuzzy_words: Vec<String> = words.iter().map(|w| fuzzed(w)).collect();
        let prefixes: Vec<String> = words.iter().map(|w| format!("{w}*")).collect();
        vec![
            (format!("@description:({})~2", fuzzy_words.join(" ")), 1.0),
            (format!("@description:({text_query})"), 5.0),
            (format!("@description:({})", prefixes.join(" ")), 0.1),
        ]
    } else {
        vec![
            (format!("@description:{}", fuzzed(text_query)), 1.0),
            (format!("@description:({text_query})"), 5.0),
            (format!("@description:{text_query}*"), 0.1),
        ]
    };

    let subqueries: Vec<String> = weighted
        .into_iter()
        .map(|(query, weight)| format!("(({query}) => {{ $weight: {weight} }})"))
        .collect();

    format!("({})", subqueries.join(" | "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build(filter: Value) -> String {
        build_redis_filter(filter.as_object().unwrap())
    }

    #[test]
    fn test_scalar_tag_equality() {
        assert_eq!(build(json!({ "make": "opel" })), "@make:{opel}");
        assert_eq!(build(json!({ "new": true })), "@new:{1}");
        assert_eq!(build(json!({ "year": 2011 })), "@year:[2011 2011]");
    }

    #[test]
    fn test_range_filter() {
        assert_eq!(
            build(json!({ "price": { "gte": 100, "lte": 200 } })),
            "@price:[100 200]"
        );
        assert_eq!(build(json!({ "price": { "gte": 100 } })), "@price:[100 +inf]");
    }

    #[test]
    fn test_contains_is_all_of() {
        assert_eq!(
            build(json!({ "tags": { "contains": ["sea_view", "new"] } })),
            "@tags:{sea_view} @tags:{new}"
        );
    }

    #[test]
    fn test_overlaps_is_any_of() {
        assert_eq!(
            build(json!({ "tags": { "overlaps": ["sea_view", "new"] } })),
            "@tags:{sea_view|new}"
        );
    }

    #[test]
    fn test_in_is_any_of() {
        assert_eq!(
            build(json!({ "make": { "in": ["opel", "bmw"] } })),
            "(@make:{opel}|@make:{bmw})"
        );
    }

    #[test]
    fn test_and_or_not() {
        assert_eq!(
            build(json!({ "and": [{ "make": "opel" }, { "year": { "gte": 2011 } }] })),
            "(@make:{opel} @year:[2011 +inf])"
        );
        assert_eq!(
            build(json!({ "or": [{ "make": "opel" }, { "make": "bmw" }] })),
            "(@make:{opel} | @make:{bmw})"
        );
        assert_eq!(build(json!({ "not": { "make": "opel" } })), "-(@make:{opel})");
    }

    #[test]
    fn test_field_names_are_normalized() {
        assert_eq!(build(json!({ "Price From": 100 })), "@price_from:[100 100]");
    }

    #[test]
    fn test_text_query_multi_word() {
        let query = build_text_query("opel kors");
        assert!(query.contains("((@description:(opel kors)~2) => { $weight: 1 })"));
        assert!(query.contains("((@description:(opel kors)) => { $weight: 5 })"));
        assert!(query.contains("((@description:(opel* kors*)) => { $weight: 0.1 })"));
    }

    #[test]
    fn test_text_query_fuzzy_distances() {
        // <=4 chars: exact; <=7: distance 1; longer: distance 2
        let query = build_text_query("opel keimerin antallaktik");
        assert!(query.contains("opel %%keimerin%% %%antallaktik%%"));

        let single = build_text_query("corsa");
        assert!(single.contains("@description:%corsa%"));
    }
}
