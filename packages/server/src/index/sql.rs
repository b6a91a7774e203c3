//! In-process index backend over the item store itself.
//!
//! Search is one SQL query: jsonb filter predicates, trigram similarity for
//! text, pgvector distance operators for vectors. There is no derived index
//! state, so recreate/cleanup/index are no-ops; the table's own indexes
//! (gin trgm, hnsw) do the work.

use async_trait::async_trait;
use pgvector::Vector;
use tracing::debug;

use super::sql_filters::{build_filter_sql, SqlArgs, SqlValue};
use super::{IndexHit, IndexSearch, Indexer};
use crate::deps::Deps;
use crate::error::{Error, Result};
use crate::models::item::SUPPORTED_VECTOR_SIZES;
use crate::models::{Collection, Item};

pub struct SqlIndexer {
    deps: Deps,
    collection: Collection,
}

impl SqlIndexer {
    pub fn new(deps: Deps, collection: Collection) -> Self {
        Self { deps, collection }
    }
}

fn build_query(collection: &Collection, request: &IndexSearch) -> Result<(String, SqlArgs)> {
    let mut args = SqlArgs::default();
    let mut where_clauses: Vec<String> = Vec::new();

    if let Some(filters) = &request.filters {
        if !filters.is_empty() {
            let filter_sql = build_filter_sql(filters, "item.fields", &mut args)?;
            if !filter_sql.is_empty() {
                where_clauses.push(filter_sql);
            }
        }
    }

    if !request.exclude_external_ids.is_empty() {
        let placeholder = args.push(SqlValue::TextArray(request.exclude_external_ids.clone()));
        where_clauses.push(format!("NOT item.external_id = ANY({placeholder})"));
    }

    let placeholder = args.push(SqlValue::Int(collection.id));
    where_clauses.push(format!("item.collection_id = {placeholder}"));

    let distance_expr = if let Some(vector) = &request.vector {
        let expected = collection.vector_size().unwrap_or(0);
        if vector.len() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                got: vector.len(),
            });
        }
        if !SUPPORTED_VECTOR_SIZES.contains(&expected) {
            return Err(Error::Config(format!(
                "unsupported vector length: {expected}"
            )));
        }
        where_clauses.push(format!("item.vectors_{expected} IS NOT NULL"));
        let placeholder = args.push(SqlValue::Vector(Vector::from(vector.clone())));
        format!("1 - (item.vectors_{expected} <=> {placeholder})")
    } else if let Some(text_query) = &request.text_query {
        let placeholder = args.push(SqlValue::Text(text_query.clone()));
        format!("similarity(item.description, {placeholder})")
    } else {
        "1".to_string()
    };

    let threshold_clause = if request.score_threshold > 0.0 {
        let placeholder = args.push(SqlValue::Float(request.score_threshold));
        format!("WHERE similarity_table.similarity > {placeholder}")
    } else {
        String::new()
    };

    let limit = args.push(SqlValue::Int(request.limit as i64));
    let offset = args.push(SqlValue::Int(request.offset as i64));

    let sql = format!(
        "SELECT id, external_id, description, similarity FROM (
            SELECT item.id, item.external_id, item.description,
                   CAST({distance_expr} AS double precision) AS similarity
            FROM item
            WHERE {where_clauses}
        ) AS similarity_table
        {threshold_clause}
        ORDER BY similarity_table.similarity DESC
        LIMIT {limit} OFFSET {offset}",
        where_clauses = where_clauses.join(" AND "),
    );

    Ok((sql, args))
}

#[async_trait]
impl Indexer for SqlIndexer {
    async fn recreate(&self) -> Result<()> {
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        Ok(())
    }

    async fn index_items(&self, _items: Option<&[Item]>) -> Result<()> {
        Ok(())
    }

    async fn search(&self, request: &IndexSearch) -> Result<Vec<IndexHit>> {
        let (sql, args) = build_query(&self.collection, request)?;

        debug!(collection = %self.collection.name, sql = %sql, "sql index search");

        let mut query = sqlx::query_as::<_, (i64, String, Option<String>, f64)>(&sql);
        for value in args.values {
            query = match value {
                SqlValue::Int(v) => query.bind(v),
                SqlValue::Float(v) => query.bind(v),
                SqlValue::Text(v) => query.bind(v),
                SqlValue::TextArray(v) => query.bind(v),
                SqlValue::Vector(v) => query.bind(v),
            };
        }

        let rows = query.fetch_all(&self.deps.pool).await?;

        Ok(rows
            .into_iter()
            .map(|(id, _external_id, description, similarity)| IndexHit {
                id,
                similarity,
                description: description.unwrap_or_default(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CollectionConfig;
    use chrono::Utc;
    use serde_json::json;

    fn collection(embeddings_model: Option<&str>) -> Collection {
        Collection {
            id: 7,
            organization_id: 1,
            name: "test_collection".into(),
            config: CollectionConfig {
                indexer: "postgres".into(),
                embeddings_model: embeddings_model.map(|m| m.to_string()),
                stemmer: vec![],
            },
            created: Utc::now(),
        }
    }

    #[test]
    fn test_text_query_shape() {
        let request = IndexSearch {
            text_query: Some("opel corsa".into()),
            ..Default::default()
        };
        let (sql, args) = build_query(&collection(None), &request).unwrap();
        assert!(sql.contains("similarity(item.description, $"));
        assert!(sql.contains("item.collection_id = $"));
        // text, collection id, limit, offset
        assert_eq!(args.values.len(), 4);
    }

    #[test]
    fn test_vector_query_picks_dimension_bucket() {
        let request = IndexSearch {
            vector: Some(vec![0.0; 1536]),
            ..Default::default()
        };
        let (sql, _) = build_query(&collection(Some("text-embedding-3-small")), &request).unwrap();
        assert!(sql.contains("item.vectors_1536 IS NOT NULL"));
        assert!(sql.contains("1 - (item.vectors_1536 <=>"));
    }

    #[test]
    fn test_vector_dimension_mismatch() {
        let request = IndexSearch {
            vector: Some(vec![0.0; 384]),
            ..Default::default()
        };
        let result = build_query(&collection(Some("text-embedding-3-small")), &request);
        assert!(matches!(
            result,
            Err(Error::DimensionMismatch {
                expected: 1536,
                got: 384
            })
        ));
    }

    #[test]
    fn test_score_threshold_wraps_subquery() {
        let request = IndexSearch {
            text_query: Some("opel".into()),
            score_threshold: 0.4,
            ..Default::default()
        };
        let (sql, _) = build_query(&collection(None), &request).unwrap();
        assert!(sql.contains("WHERE similarity_table.similarity > $"));
    }

    #[test]
    fn test_exclude_ids() {
        let request = IndexSearch {
            exclude_external_ids: vec!["1".into(), "2".into()],
            ..Default::default()
        };
        let (sql, _) = build_query(&collection(None), &request).unwrap();
        assert!(sql.contains("NOT item.external_id = ANY($"));
    }

    #[test]
    fn test_filters_compile_into_predicates() {
        let request = IndexSearch {
            filters: json!({ "price": { "gte": 100, "lte": 200 } })
                .as_object()
                .cloned(),
            ..Default::default()
        };
        let (sql, args) = build_query(&collection(None), &request).unwrap();
        assert!(sql.contains("item.fields->>'price'"));
        // two range bounds, collection id, limit, offset
        assert_eq!(args.values.len(), 5);
    }
}
