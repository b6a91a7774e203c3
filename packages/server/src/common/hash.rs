use serde_json::Value;
use sha2::{Digest, Sha256};

/// Stable content hash: hex SHA-256 of the input.
///
/// Used for cache keys and request fingerprints; the algorithm is fixed per
/// deployment so keys survive restarts.
pub fn stable_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Serialize a JSON value canonically.
///
/// `serde_json::Map` keeps its keys ordered, so serialization is key-sorted
/// and two structurally equal values produce identical strings regardless of
/// the insertion order in the source maps.
pub fn canonical_json(value: &Value) -> String {
    fn sort(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut sorted = serde_json::Map::new();
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                for key in keys {
                    sorted.insert(key.clone(), sort(&map[key]));
                }
                Value::Object(sorted)
            }
            Value::Array(items) => Value::Array(items.iter().map(sort).collect()),
            other => other.clone(),
        }
    }
    sort(value).to_string()
}

/// Canonical JSON of anything serializable.
pub fn canonical_json_of<T: serde::Serialize>(value: &T) -> String {
    let json = serde_json::to_value(value).unwrap_or(Value::Null);
    canonical_json(&json)
}

/// Short digest of an item description, used for change detection.
pub fn description_hash(description: &str) -> String {
    let json = serde_json::to_string(description).unwrap_or_default();
    format!("{:x}", md5::compute(format!("${json}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stable_hash_is_deterministic() {
        assert_eq!(stable_hash("opel corsa"), stable_hash("opel corsa"));
        assert_ne!(stable_hash("opel corsa"), stable_hash("bmw 316"));
    }

    #[test]
    fn test_stable_hash_format() {
        let hash = stable_hash("anything");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_canonical_json_ignores_key_order() {
        let a = json!({ "make": "opel", "price": 3000, "tags": ["a", "b"] });
        let b = json!({ "tags": ["a", "b"], "price": 3000, "make": "opel" });
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn test_canonical_json_sorts_nested_maps() {
        let a = json!({ "filter": { "price": { "lte": 200, "gte": 100 } } });
        let b = json!({ "filter": { "price": { "gte": 100, "lte": 200 } } });
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn test_canonical_json_preserves_array_order() {
        let a = json!([1, 2, 3]);
        let b = json!([3, 2, 1]);
        assert_ne!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn test_description_hash_changes_with_content() {
        assert_eq!(description_hash("bmw 316"), description_hash("bmw 316"));
        assert_ne!(description_hash("bmw 316"), description_hash("opel corsa"));
    }
}
