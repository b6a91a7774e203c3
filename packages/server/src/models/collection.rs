use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::error::Result;
use crate::models::ns_id;

/// Per-collection configuration: index backend, embeddings model and the
/// ordered stemmer pipeline for indexable text.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CollectionConfig {
    #[serde(default = "default_indexer")]
    pub indexer: String,

    #[serde(default)]
    pub embeddings_model: Option<String>,

    #[serde(default)]
    pub stemmer: Vec<String>,
}

fn default_indexer() -> String {
    "postgres".to_string()
}

/// A named index unit scoped to an organization.
#[derive(Debug, Clone)]
pub struct Collection {
    pub id: i64,
    pub organization_id: i64,
    pub name: String,
    pub config: CollectionConfig,
    pub created: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for Collection {
    fn from_row(row: &'r PgRow) -> std::result::Result<Self, sqlx::Error> {
        let config: Value = row.try_get("config")?;
        let config: CollectionConfig = serde_json::from_value(config).unwrap_or_default();
        Ok(Self {
            id: row.try_get("id")?,
            organization_id: row.try_get("organization_id")?,
            name: row.try_get("name")?,
            config,
            created: row.try_get("created")?,
        })
    }
}

impl Collection {
    pub async fn get_by_name(
        pool: &PgPool,
        organization_id: i64,
        name: &str,
    ) -> Result<Option<Self>> {
        let collection = sqlx::query_as::<_, Collection>(
            "SELECT * FROM collection WHERE organization_id = $1 AND name = $2",
        )
        .bind(organization_id)
        .bind(name)
        .fetch_optional(pool)
        .await?;

        Ok(collection)
    }

    pub async fn get_or_create(pool: &PgPool, organization_id: i64, name: &str) -> Result<Self> {
        if let Some(collection) = Self::get_by_name(pool, organization_id, name).await? {
            return Ok(collection);
        }

        sqlx::query(
            "INSERT INTO collection (id, organization_id, name) VALUES ($1, $2, $3)
             ON CONFLICT (organization_id, name) DO NOTHING",
        )
        .bind(ns_id())
        .bind(organization_id)
        .bind(name)
        .execute(pool)
        .await?;

        let collection = Self::get_by_name(pool, organization_id, name)
            .await?
            .ok_or_else(|| sqlx::Error::RowNotFound)?;

        Ok(collection)
    }

    pub async fn all(pool: &PgPool) -> Result<Vec<Self>> {
        let collections = sqlx::query_as::<_, Collection>("SELECT * FROM collection")
            .fetch_all(pool)
            .await?;
        Ok(collections)
    }

    /// Merge a config patch into the stored config.
    pub async fn update_config(&mut self, pool: &PgPool, patch: &Value) -> Result<()> {
        let mut current = serde_json::to_value(&self.config).unwrap_or(Value::Null);
        deep_merge(&mut current, patch);

        sqlx::query("UPDATE collection SET config = $2 WHERE id = $1")
            .bind(self.id)
            .bind(&current)
            .execute(pool)
            .await?;

        self.config = serde_json::from_value(current).unwrap_or_default();
        Ok(())
    }

    /// Drop the collection. Items, persons, events, field metadata and
    /// search history cascade at the store level.
    pub async fn delete(&self, pool: &PgPool) -> Result<()> {
        sqlx::query("DELETE FROM collection WHERE id = $1")
            .bind(self.id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// The dimension of vectors this collection embeds into, if any.
    pub fn vector_size(&self) -> Option<usize> {
        crate::embeddings::model_vector_size(self.config.embeddings_model.as_deref()?)
    }
}

fn deep_merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_defaults() {
        let config: CollectionConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config.indexer, "postgres");
        assert!(config.embeddings_model.is_none());
        assert!(config.stemmer.is_empty());
    }

    #[test]
    fn test_config_parsing() {
        let config: CollectionConfig = serde_json::from_value(json!({
            "indexer": "redis",
            "embeddings_model": "text-embedding-3-small",
            "stemmer": ["english", "greeklish"]
        }))
        .unwrap();
        assert_eq!(config.indexer, "redis");
        assert_eq!(
            config.embeddings_model.as_deref(),
            Some("text-embedding-3-small")
        );
        assert_eq!(config.stemmer, vec!["english", "greeklish"]);
    }

    #[test]
    fn test_deep_merge_keeps_unpatched_keys() {
        let mut current = json!({ "indexer": "redis", "stemmer": ["english"] });
        deep_merge(&mut current, &json!({ "embeddings_model": "text-embedding-3-small" }));
        assert_eq!(current["indexer"], "redis");
        assert_eq!(current["embeddings_model"], "text-embedding-3-small");
        assert_eq!(current["stemmer"], json!(["english"]));
    }

    #[test]
    fn test_deep_merge_overrides_scalars() {
        let mut current = json!({ "indexer": "postgres" });
        deep_merge(&mut current, &json!({ "indexer": "redis" }));
        assert_eq!(current["indexer"], "redis");
    }
}
