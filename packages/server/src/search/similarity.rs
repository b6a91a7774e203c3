//! Orchestrates one hybrid retrieval: vector averaging, text query merging,
//! filter composition, the index call and hydration from the item store.

use serde_json::{Map, Value};

use crate::common::vars::Context;
use crate::deps::Deps;
use crate::error::{Error, Result};
use crate::index::{indexer_for, IndexSearch};
use crate::models::{Collection, Item};
use crate::search::query_parser::QueryParser;
use crate::search::types::{
    Export, ParsedQueries, SearchConfig, SearchItem, TextQuery, VectorQuery,
};

pub struct SimilarityEngine<'a> {
    deps: &'a Deps,
    collection: &'a Collection,
}

/// Weighted average: elementwise sum of `v_i * w_i`, divided by the number
/// of vectors. Weights are multiplicative scales, not a normalization.
pub fn average_weighted_vectors(vectors: &[VectorQuery]) -> Result<Vec<f32>> {
    let Some(first) = vectors.first() else {
        return Ok(Vec::new());
    };
    let size = first.vector.len();
    let mut sum = vec![0.0f32; size];

    for query in vectors {
        if query.vector.len() != size {
            return Err(Error::DimensionMismatch {
                expected: size,
                got: query.vector.len(),
            });
        }
        for (slot, value) in sum.iter_mut().zip(&query.vector) {
            *slot += value * query.weight as f32;
        }
    }

    let count = vectors.len() as f32;
    for slot in &mut sum {
        *slot /= count;
    }

    Ok(sum)
}

/// Concatenate text queries with a single space; the threshold is the
/// smallest configured one.
pub fn merge_text_queries(texts: &[TextQuery]) -> (Option<String>, f64) {
    if texts.is_empty() {
        return (None, 0.0);
    }

    let merged = texts
        .iter()
        .map(|t| t.query.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let threshold = texts
        .iter()
        .filter_map(|t| t.score_threshold)
        .fold(f64::INFINITY, f64::min);
    let threshold = if threshold.is_finite() { threshold } else { 0.0 };

    (Some(merged), threshold)
}

/// Shallow-union filter maps, last writer wins.
pub fn merge_filters(filters: &[Map<String, Value>]) -> Map<String, Value> {
    let mut merged = Map::new();
    for filter in filters {
        for (key, value) in filter {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// The exported payload of a hit: all fields, one field, or a projection.
pub fn export_fields(fields: &Map<String, Value>, export: Option<&Export>) -> Value {
    match export {
        None => Value::Object(fields.clone()),
        Some(Export::Field(name)) => fields.get(name).cloned().unwrap_or(Value::Null),
        Some(Export::Fields(names)) => {
            let projected: Map<String, Value> = names
                .iter()
                .map(|name| {
                    (
                        name.clone(),
                        fields.get(name).cloned().unwrap_or(Value::Null),
                    )
                })
                .collect();
            Value::Object(projected)
        }
    }
}

impl<'a> SimilarityEngine<'a> {
    pub fn new(deps: &'a Deps, collection: &'a Collection) -> Self {
        Self { deps, collection }
    }

    pub async fn search(
        &self,
        config: &SearchConfig,
        exclude: &[String],
        context: &Context,
    ) -> Result<Vec<SearchItem>> {
        let parser = QueryParser::new(self.deps, self.collection, context);

        let clauses = config
            .similar
            .as_ref()
            .map(|s| s.of.as_slice())
            .unwrap_or_default();
        let mut parsed: ParsedQueries = parser.parse(clauses).await?;

        // Request-level filters join the clause-produced ones.
        for filter_clause in &config.filters {
            parsed.filters.push(filter_clause.fields.clone());
        }
        if !config.filter.is_empty() {
            parsed.filters.push(config.filter.clone());
        }

        let filters = merge_filters(&parsed.filters);

        if parsed.vectors.is_empty() && parsed.texts.is_empty() && filters.is_empty() {
            return Ok(Vec::new());
        }

        let vector = if parsed.vectors.is_empty() {
            None
        } else {
            Some(average_weighted_vectors(&parsed.vectors)?)
        };

        let (text_query, score_threshold) = merge_text_queries(&parsed.texts);

        let index_limit = config
            .limit
            .max(config.rank.as_ref().and_then(|r| r.topn).unwrap_or(0));

        let request = IndexSearch {
            filters: if filters.is_empty() {
                None
            } else {
                Some(filters)
            },
            text_query,
            vector,
            limit: index_limit,
            offset: config.offset,
            score_threshold,
            exclude_external_ids: exclude.to_vec(),
            raw_query: None,
        };

        let indexer = indexer_for(self.deps, self.collection)?;
        let hits = indexer.search(&request).await?;

        // Hydrate in hit order.
        let ids: Vec<i64> = hits.iter().map(|hit| hit.id).collect();
        let items = Item::get_by_ids(&self.deps.pool, &ids).await?;

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(item) = items.iter().find(|item| item.id == hit.id) else {
                continue;
            };
            let fields = item.fields_map();
            results.push(SearchItem {
                id: item.external_id.clone(),
                exported: Some(export_fields(&fields, config.export.as_ref())),
                fields,
                score: hit.similarity,
                scores: item.scores_map(),
                description: item.description.clone(),
            });
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vq(vector: Vec<f32>, weight: f64) -> VectorQuery {
        VectorQuery { vector, weight }
    }

    fn tq(query: &str, threshold: Option<f64>) -> TextQuery {
        TextQuery {
            query: query.to_string(),
            weight: 1.0,
            distance_function: None,
            score_threshold: threshold,
        }
    }

    #[test]
    fn test_single_vector_average_is_the_vector() {
        let average = average_weighted_vectors(&[vq(vec![1.0, 2.0, 3.0], 1.0)]).unwrap();
        assert_eq!(average, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_weight_scales_before_averaging() {
        let average = average_weighted_vectors(&[vq(vec![1.0, 1.0], 2.0)]).unwrap();
        assert_eq!(average, vec![2.0, 2.0]);
    }

    #[test]
    fn test_two_vector_average() {
        let average =
            average_weighted_vectors(&[vq(vec![1.0, 0.0], 1.0), vq(vec![0.0, 1.0], 1.0)])
                .unwrap();
        assert_eq!(average, vec![0.5, 0.5]);
    }

    #[test]
    fn test_mismatched_vector_lengths() {
        let result =
            average_weighted_vectors(&[vq(vec![1.0, 0.0], 1.0), vq(vec![1.0], 1.0)]);
        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn test_empty_vectors() {
        assert!(average_weighted_vectors(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_merge_text_queries() {
        let (merged, threshold) =
            merge_text_queries(&[tq("opel corsa", Some(0.5)), tq("diesel", Some(0.2))]);
        assert_eq!(merged.as_deref(), Some("opel corsa diesel"));
        assert_eq!(threshold, 0.2);
    }

    #[test]
    fn test_merge_text_queries_defaults() {
        let (merged, threshold) = merge_text_queries(&[]);
        assert!(merged.is_none());
        assert_eq!(threshold, 0.0);

        let (_, threshold) = merge_text_queries(&[tq("opel", None)]);
        assert_eq!(threshold, 0.0);
    }

    #[test]
    fn test_merge_filters_last_writer_wins() {
        let a = json!({ "make": "opel", "year": 2011 }).as_object().cloned().unwrap();
        let b = json!({ "make": "bmw" }).as_object().cloned().unwrap();
        let merged = merge_filters(&[a, b]);
        assert_eq!(merged["make"], "bmw");
        assert_eq!(merged["year"], 2011);
    }

    #[test]
    fn test_export_variants() {
        let fields = json!({ "make": "opel", "price": 3000 })
            .as_object()
            .cloned()
            .unwrap();

        assert_eq!(
            export_fields(&fields, None),
            json!({ "make": "opel", "price": 3000 })
        );
        assert_eq!(
            export_fields(&fields, Some(&Export::Field("make".into()))),
            json!("opel")
        );
        assert_eq!(
            export_fields(
                &fields,
                Some(&Export::Fields(vec!["make".into(), "missing".into()]))
            ),
            json!({ "make": "opel", "missing": null })
        );
    }
}
