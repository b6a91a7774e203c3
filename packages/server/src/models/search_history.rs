use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::error::Result;
use crate::models::ns_id;

/// One row per search: the external ids served plus the request snapshot.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SearchHistory {
    pub id: i64,
    pub collection_id: i64,
    pub external_person_id: Option<String>,
    pub external_item_ids: Vec<String>,
    pub search_config: Value,
    pub created: DateTime<Utc>,
}

impl SearchHistory {
    pub async fn insert(
        pool: &PgPool,
        collection_id: i64,
        external_person_id: Option<&str>,
        external_item_ids: &[String],
        search_config: &Value,
    ) -> Result<i64> {
        let id = ns_id();
        sqlx::query(
            "INSERT INTO search_history
                (id, collection_id, external_person_id, external_item_ids, search_config)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(collection_id)
        .bind(external_person_id)
        .bind(external_item_ids)
        .bind(search_config)
        .execute(pool)
        .await?;
        Ok(id)
    }

    /// Item ids served to a person by prior searches, most recent first.
    pub async fn served_item_ids(
        pool: &PgPool,
        collection_id: i64,
        external_person_id: &str,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT UNNEST(external_item_ids) AS id
             FROM search_history
             WHERE collection_id = $1 AND external_person_id = $2 AND created > $3
             ORDER BY created DESC
             LIMIT $4",
        )
        .bind(collection_id)
        .bind(external_person_id)
        .bind(since)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// The most recent search that served this item to this person, for the
    /// event back-reference.
    pub async fn latest_serving(
        pool: &PgPool,
        collection_id: i64,
        external_person_id: &str,
        item_external_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM search_history
             WHERE collection_id = $1
               AND external_person_id = $2
               AND external_item_ids @> ARRAY[$3]
               AND created > $4
             ORDER BY created DESC
             LIMIT 1",
        )
        .bind(collection_id)
        .bind(external_person_id)
        .bind(item_external_id)
        .bind(since)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|(id,)| id))
    }

    /// Retention: drop history rows older than the cutoff.
    pub async fn cleanup_older_than(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM search_history WHERE created < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
