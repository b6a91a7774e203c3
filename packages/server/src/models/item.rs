use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use pgvector::Vector;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::PgPool;

use crate::common::hash::description_hash;
use crate::error::Result;

/// The indexed unit, as stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Item {
    pub id: i64,
    pub collection_id: i64,
    pub external_id: String,
    pub fields: Value,
    pub scores: Value,
    pub description: Option<String>,
    pub description_hash: Option<String>,
    pub vectors_384: Option<Vector>,
    pub vectors_768: Option<Vector>,
    pub vectors_1536: Option<Vector>,
    pub vectors_3072: Option<Vector>,
    pub is_embeddings_dirty: bool,
    pub is_index_dirty: bool,
    pub created: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

/// Vector lengths the store has a column for.
pub const SUPPORTED_VECTOR_SIZES: &[usize] = &[384, 768, 1536, 3072];

impl Item {
    /// The item's vector, from whichever dimension bucket is populated.
    pub fn vector(&self) -> Option<Vec<f32>> {
        [
            &self.vectors_3072,
            &self.vectors_1536,
            &self.vectors_768,
            &self.vectors_384,
        ]
        .into_iter()
        .flatten()
        .next()
        .map(|v| v.as_slice().to_vec())
    }

    pub fn fields_map(&self) -> Map<String, Value> {
        self.fields.as_object().cloned().unwrap_or_default()
    }

    pub fn scores_map(&self) -> BTreeMap<String, f64> {
        match self.scores.as_object() {
            Some(map) => map
                .iter()
                .filter_map(|(k, v)| v.as_f64().map(|f| (k.clone(), f)))
                .collect(),
            None => BTreeMap::new(),
        }
    }

    /// Content digest of the current description.
    pub fn content_hash(&self) -> String {
        match &self.description {
            Some(description) => description_hash(description),
            None => description_hash(""),
        }
    }

    pub async fn get_by_external_ids(
        pool: &PgPool,
        collection_id: i64,
        external_ids: &[String],
    ) -> Result<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(
            "SELECT * FROM item WHERE collection_id = $1 AND external_id = ANY($2)",
        )
        .bind(collection_id)
        .bind(external_ids)
        .fetch_all(pool)
        .await?;
        Ok(items)
    }

    pub async fn get_by_ids(pool: &PgPool, ids: &[i64]) -> Result<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>("SELECT * FROM item WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(pool)
            .await?;
        Ok(items)
    }

    pub async fn all_of_collection(pool: &PgPool, collection_id: i64) -> Result<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>("SELECT * FROM item WHERE collection_id = $1")
            .bind(collection_id)
            .fetch_all(pool)
            .await?;
        Ok(items)
    }

    /// One batch of items whose embeddings or index state is stale.
    pub async fn dirty_batch(
        pool: &PgPool,
        collection_id: i64,
        limit: i64,
    ) -> Result<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(
            "SELECT * FROM item
             WHERE collection_id = $1 AND (is_embeddings_dirty OR is_index_dirty)
             ORDER BY id LIMIT $2",
        )
        .bind(collection_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(items)
    }

    /// Store a freshly computed vector in the bucket matching its length and
    /// clear the dirty flags in the same update.
    pub async fn store_vector(&self, pool: &PgPool, vector: Option<&[f32]>) -> Result<()> {
        let mut v384 = None;
        let mut v768 = None;
        let mut v1536 = None;
        let mut v3072 = None;
        match vector.map(|v| v.len()) {
            Some(384) => v384 = vector.map(|v| Vector::from(v.to_vec())),
            Some(768) => v768 = vector.map(|v| Vector::from(v.to_vec())),
            Some(1536) => v1536 = vector.map(|v| Vector::from(v.to_vec())),
            Some(3072) => v3072 = vector.map(|v| Vector::from(v.to_vec())),
            _ => {}
        }

        sqlx::query(
            "UPDATE item SET
                vectors_384 = $2, vectors_768 = $3, vectors_1536 = $4, vectors_3072 = $5,
                description_hash = $6, is_embeddings_dirty = FALSE, last_update = now()
             WHERE id = $1",
        )
        .bind(self.id)
        .bind(v384)
        .bind(v768)
        .bind(v1536)
        .bind(v3072)
        .bind(self.content_hash())
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn clear_index_dirty(pool: &PgPool, ids: &[i64]) -> Result<()> {
        sqlx::query(
            "UPDATE item SET is_index_dirty = FALSE, last_update = now() WHERE id = ANY($1)",
        )
        .bind(ids)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn delete_by_external_ids(
        pool: &PgPool,
        collection_id: i64,
        external_ids: &[String],
    ) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM item WHERE collection_id = $1 AND external_id = ANY($2)")
                .bind(collection_id)
                .bind(external_ids)
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }
}

/// Preprocess directive for an ingested description: one LLM rewrite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptionPreprocess {
    #[serde(default)]
    pub model: Option<String>,
    pub prompt: String,
}

/// An item as submitted by clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleItem {
    pub id: String,

    #[serde(default)]
    pub fields: Map<String, Value>,

    #[serde(default)]
    pub scores: BTreeMap<String, f64>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub description_from_fields: Option<Vec<String>>,

    #[serde(default)]
    pub description_preprocess: Option<DescriptionPreprocess>,
}

impl SimpleItem {
    /// The description text before any LLM preprocessing: explicit, or a
    /// projection of selected fields, or every field spelled out.
    pub fn base_description(&self, merged_fields: &Map<String, Value>) -> String {
        if let Some(description) = &self.description {
            return description.clone();
        }

        if let Some(from_fields) = &self.description_from_fields {
            let projected: Map<String, Value> = merged_fields
                .iter()
                .filter(|(name, _)| from_fields.contains(name))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
            return fields_to_description(&projected);
        }

        fields_to_description(merged_fields)
    }
}

/// Spell out a field map as indexable text, one "name is values" line per
/// field.
pub fn fields_to_description(fields: &Map<String, Value>) -> String {
    fields
        .iter()
        .map(|(name, value)| {
            format!(
                "{} is {}",
                name,
                crate::common::value_strings(value).join(" ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
