//! Search request and response types.
//!
//! The `similar.of` list mixes heterogeneous clauses; each is a variant of
//! one sum type discriminated by its distinguishing field. Inputs matching
//! no variant (or mixing fields of several) are rejected at the schema
//! boundary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A value that may arrive as one element or a list of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Clone> OneOrMany<T> {
    pub fn to_vec(&self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value.clone()],
            OneOrMany::Many(values) => values.clone(),
        }
    }
}

/// One LLM rewrite applied to a query or prompt before use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preprocess {
    #[serde(default)]
    pub model: Option<String>,
    pub prompt: String,
}

fn default_weight() -> f64 {
    1.0
}

fn default_person_time() -> String {
    "1M".to_string()
}

fn default_person_limit() -> usize {
    10
}

fn default_recommendations_time() -> String {
    "7d".to_string()
}

fn default_recommendations_limit() -> usize {
    500
}

/// Full-text query clause.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextClause {
    pub text: String,

    #[serde(default = "default_weight")]
    pub weight: f64,

    #[serde(default)]
    pub distance_function: Option<String>,

    #[serde(default)]
    pub preprocess: Option<Preprocess>,

    #[serde(default)]
    pub score_threshold: Option<f64>,
}

/// Embed a free-text prompt into a query vector. `$name` references are
/// substituted from the request context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PromptClause {
    pub prompt: String,

    #[serde(default = "default_weight")]
    pub weight: f64,

    #[serde(default)]
    pub preprocess: Option<Preprocess>,
}

/// Pass a precomputed vector through.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingsClause {
    pub embeddings: Vec<f32>,

    #[serde(default = "default_weight")]
    pub weight: f64,
}

/// Embed a field map into a query vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimilarToFieldsClause {
    pub similar_to_fields: Map<String, Value>,

    #[serde(default = "default_weight")]
    pub weight: f64,
}

/// Filter predicate clause.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldsClause {
    pub fields: Map<String, Value>,
}

/// Use the vectors of referenced items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemClause {
    pub item: OneOrMany<String>,

    #[serde(default = "default_weight")]
    pub weight: f64,
}

/// Use the vectors (or ids) of items a person recently interacted with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersonClause {
    pub person: OneOrMany<String>,

    #[serde(default = "default_person_time")]
    pub time: String,

    #[serde(default = "default_person_limit")]
    pub limit: usize,

    #[serde(default = "default_weight")]
    pub weight: f64,
}

/// Items served to a person by prior searches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecommendationsClause {
    pub person_recommendations: String,

    #[serde(default = "default_recommendations_time")]
    pub time: String,

    #[serde(default = "default_recommendations_limit")]
    pub limit: usize,

    #[serde(default = "default_weight")]
    pub weight: f64,
}

/// One element of `similar.of` (or of an exclude list).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Clause {
    Text(TextClause),
    Prompt(PromptClause),
    Embeddings(EmbeddingsClause),
    SimilarToFields(SimilarToFieldsClause),
    Fields(FieldsClause),
    Item(ItemClause),
    Person(PersonClause),
    Recommendations(RecommendationsClause),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarConfig {
    pub of: Vec<Clause>,
}

/// Re-ranking configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankConfig {
    #[serde(default)]
    pub score_function: Option<String>,

    #[serde(default)]
    pub topn: Option<usize>,

    #[serde(default)]
    pub randomize: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_expire")]
    pub expire: u64,

    #[serde(default)]
    pub key: Option<String>,
}

fn default_cache_expire() -> u64 {
    3600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expire: default_cache_expire(),
            key: None,
        }
    }
}

fn default_search_cache() -> Option<CacheConfig> {
    Some(CacheConfig::default())
}

/// Projection applied to an item's fields before returning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Export {
    Field(String),
    Fields(Vec<String>),
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub similar: Option<SimilarConfig>,

    #[serde(default)]
    pub filters: Vec<FieldsClause>,

    #[serde(default)]
    pub filter: Map<String, Value>,

    #[serde(default)]
    pub exclude: Vec<Clause>,

    #[serde(default)]
    pub for_person: Option<String>,

    #[serde(default = "default_limit")]
    pub limit: usize,

    #[serde(default)]
    pub offset: usize,

    #[serde(default)]
    pub export: Option<Export>,

    #[serde(default)]
    pub rank: Option<RankConfig>,

    #[serde(default = "default_search_cache")]
    pub cache: Option<CacheConfig>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            similar: None,
            filters: Vec::new(),
            filter: Map::new(),
            exclude: Vec::new(),
            for_person: None,
            limit: default_limit(),
            offset: 0,
            export: None,
            rank: None,
            cache: default_search_cache(),
        }
    }
}

/// One returned item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchItem {
    pub id: String,
    pub fields: Map<String, Value>,
    pub score: f64,

    #[serde(default)]
    pub scores: BTreeMap<String, f64>,

    #[serde(default)]
    pub exported: Option<Value>,

    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub items: Vec<SearchItem>,

    #[serde(default)]
    pub id: Option<i64>,
}

/// A vector produced by clause parsing, with its clause weight.
#[derive(Debug, Clone)]
pub struct VectorQuery {
    pub vector: Vec<f32>,
    pub weight: f64,
}

/// A text query produced by clause parsing.
#[derive(Debug, Clone)]
pub struct TextQuery {
    pub query: String,
    pub weight: f64,
    pub distance_function: Option<String>,
    pub score_threshold: Option<f64>,
}

/// The three uniform streams the parser produces from a clause list.
#[derive(Debug, Default)]
pub struct ParsedQueries {
    pub vectors: Vec<VectorQuery>,
    pub texts: Vec<TextQuery>,
    pub filters: Vec<Map<String, Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clause_discrimination() {
        let clause: Clause = serde_json::from_value(json!({ "text": "opel corsa" })).unwrap();
        assert!(matches!(clause, Clause::Text(_)));

        let clause: Clause = serde_json::from_value(json!({ "prompt": "bmw" })).unwrap();
        assert!(matches!(clause, Clause::Prompt(_)));

        let clause: Clause =
            serde_json::from_value(json!({ "embeddings": [0.1, 0.2] })).unwrap();
        assert!(matches!(clause, Clause::Embeddings(_)));

        let clause: Clause =
            serde_json::from_value(json!({ "fields": { "make": "opel" } })).unwrap();
        assert!(matches!(clause, Clause::Fields(_)));

        let clause: Clause =
            serde_json::from_value(json!({ "similar_to_fields": { "make": "opel" } })).unwrap();
        assert!(matches!(clause, Clause::SimilarToFields(_)));

        let clause: Clause = serde_json::from_value(json!({ "item": ["1", "2"] })).unwrap();
        assert!(matches!(clause, Clause::Item(_)));

        let clause: Clause = serde_json::from_value(json!({ "person": "p1" })).unwrap();
        assert!(matches!(clause, Clause::Person(_)));
    }

    #[test]
    fn test_ambiguous_clause_rejected() {
        let result: Result<Clause, _> =
            serde_json::from_value(json!({ "text": "opel", "prompt": "bmw" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_clause_rejected() {
        let result: Result<Clause, _> = serde_json::from_value(json!({ "nonsense": 1 }));
        assert!(result.is_err());
    }

    #[test]
    fn test_clause_defaults() {
        let clause: Clause = serde_json::from_value(json!({ "person": "p1" })).unwrap();
        let Clause::Person(person) = clause else {
            unreachable!()
        };
        assert_eq!(person.time, "1M");
        assert_eq!(person.limit, 10);
        assert_eq!(person.weight, 1.0);
    }

    #[test]
    fn test_search_config_defaults() {
        let config: SearchConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config.limit, 10);
        assert_eq!(config.offset, 0);
        assert_eq!(config.cache.as_ref().map(|c| c.expire), Some(3600));
    }

    #[test]
    fn test_cache_null_disables() {
        let config: SearchConfig = serde_json::from_value(json!({ "cache": null })).unwrap();
        assert!(config.cache.is_none());
    }

    #[test]
    fn test_s1_shape_parses() {
        let config: SearchConfig = serde_json::from_value(json!({
            "similar": { "of": [{ "text": "opel corsa" }] },
            "cache": null
        }))
        .unwrap();
        let of = &config.similar.unwrap().of;
        assert_eq!(of.len(), 1);
        assert!(matches!(of[0], Clause::Text(_)));
    }

    #[test]
    fn test_export_forms() {
        let config: SearchConfig =
            serde_json::from_value(json!({ "export": "value" })).unwrap();
        assert!(matches!(config.export, Some(Export::Field(_))));

        let config: SearchConfig =
            serde_json::from_value(json!({ "export": ["make", "price"] })).unwrap();
        assert!(matches!(config.export, Some(Export::Fields(_))));
    }
}
