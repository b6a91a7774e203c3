//! Per-collection search indexes.
//!
//! Two backends implement the same contract: an in-process one over the
//! item store itself (jsonb filters, trigram text similarity, pgvector
//! distances) and an external text+vector index in Redis. The backend is
//! selected by collection config at load time; nothing above this module
//! knows which one is in play.

pub mod redis;
mod redis_filters;
pub mod sql;
mod sql_filters;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::deps::Deps;
use crate::error::{Error, Result};
use crate::models::{Collection, Item};

/// One hit from an index search.
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub id: i64,
    pub similarity: f64,
    pub description: String,
}

/// Arguments of one index search.
#[derive(Debug, Clone)]
pub struct IndexSearch {
    pub filters: Option<Map<String, Value>>,
    pub text_query: Option<String>,
    pub vector: Option<Vec<f32>>,
    pub limit: usize,
    pub offset: usize,
    pub score_threshold: f64,
    pub exclude_external_ids: Vec<String>,
    pub raw_query: Option<String>,
}

impl Default for IndexSearch {
    fn default() -> Self {
        Self {
            filters: None,
            text_query: None,
            vector: None,
            limit: 10,
            offset: 0,
            score_threshold: 0.0,
            exclude_external_ids: Vec::new(),
            raw_query: None,
        }
    }
}

/// Contract of a per-collection index backend.
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Drop any index state, re-create the schema and bulk-index every item.
    async fn recreate(&self) -> Result<()>;

    /// Reconcile index membership with the item store.
    async fn cleanup(&self) -> Result<()>;

    /// Upsert the given items, or all of the collection's items.
    async fn index_items(&self, items: Option<&[Item]>) -> Result<()>;

    async fn search(&self, request: &IndexSearch) -> Result<Vec<IndexHit>>;
}

/// Select the backend configured for a collection.
pub fn indexer_for(deps: &Deps, collection: &Collection) -> Result<Box<dyn Indexer>> {
    match collection.config.indexer.as_str() {
        "redis" => Ok(Box::new(redis::RedisIndexer::new(
            deps.clone(),
            collection.clone(),
        ))),
        "postgres" => Ok(Box::new(sql::SqlIndexer::new(
            deps.clone(),
            collection.clone(),
        ))),
        other => Err(Error::Config(format!("unknown indexer: {other}"))),
    }
}

/// Process-wide reconciliation: drop index state whose collection is gone.
pub async fn cleanup_all(deps: &Deps) -> Result<()> {
    redis::cleanup_all(deps).await
}

/// Index field names are normalized: lowercased, separators to underscores.
pub fn normalize_field(field_name: &str) -> String {
    field_name
        .replace([' ', '-', '.'], "_")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_field() {
        assert_eq!(normalize_field("Price From"), "price_from");
        assert_eq!(normalize_field("made-in"), "made_in");
        assert_eq!(normalize_field("specs.engine"), "specs_engine");
    }
}
