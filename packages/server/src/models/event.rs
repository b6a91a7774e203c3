use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::Result;
use crate::models::ns_id;

/// An interaction emitted by a person against an item. Append-only; pruned
/// by the retention jobs.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Event {
    pub id: i64,
    pub collection_id: i64,
    pub event_type: String,
    pub person_external_id: Option<String>,
    pub item_external_id: Option<String>,
    pub weight: f64,
    pub related_search_id: Option<i64>,
    pub created: DateTime<Utc>,
}

/// An event as submitted by clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleEvent {
    #[serde(default = "default_event_type", rename = "event")]
    pub event_type: String,

    #[serde(default)]
    pub date: Option<DateTime<Utc>>,

    pub person: String,
    pub item: String,

    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_event_type() -> String {
    "interaction".to_string()
}

fn default_weight() -> f64 {
    1.0
}

impl Event {
    pub async fn insert(
        pool: &PgPool,
        collection_id: i64,
        event: &SimpleEvent,
        related_search_id: Option<i64>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO event
                (id, collection_id, event_type, person_external_id, item_external_id,
                 weight, related_search_id, created)
             VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, now()))",
        )
        .bind(ns_id())
        .bind(collection_id)
        .bind(&event.event_type)
        .bind(&event.person)
        .bind(&event.item)
        .bind(event.weight)
        .bind(related_search_id)
        .bind(event.date)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Most recent items the given persons interacted with inside the time
    /// window, with the strongest event weight per item.
    pub async fn recent_weighted_items(
        pool: &PgPool,
        collection_id: i64,
        person_external_ids: &[String],
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<(String, f64)>> {
        let rows: Vec<(String, f64)> = sqlx::query_as(
            "SELECT item_external_id, MAX(weight) AS weight
             FROM event
             WHERE collection_id = $1
               AND person_external_id = ANY($2)
               AND item_external_id IS NOT NULL
               AND created > $3
             GROUP BY item_external_id
             ORDER BY MAX(created) DESC
             LIMIT $4",
        )
        .bind(collection_id)
        .bind(person_external_ids)
        .bind(since)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    pub async fn delete_of_collection(pool: &PgPool, collection_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM event WHERE collection_id = $1")
            .bind(collection_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Retention: drop events older than the cutoff.
    pub async fn cleanup_older_than(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM event WHERE created < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Retention: drop all events of persons who emitted at most
    /// `min_count` events, all older than the cutoff.
    pub async fn cleanup_lone_person_events(
        pool: &PgPool,
        cutoff: DateTime<Utc>,
        min_count: i64,
    ) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM event
             WHERE person_external_id IN (
                 SELECT person_external_id
                 FROM event
                 WHERE created < $1
                 GROUP BY person_external_id
                 HAVING COUNT(*) <= $2
             )",
        )
        .bind(cutoff)
        .bind(min_count)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Retention: keep only the most recent `keep` events per
    /// (person, event type).
    pub async fn cleanup_max_per_person_and_type(pool: &PgPool, keep: i64) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM event
             WHERE id IN (
                 SELECT id FROM (
                     SELECT id,
                            ROW_NUMBER() OVER (
                                PARTITION BY person_external_id, event_type
                                ORDER BY created DESC
                            ) AS rank
                     FROM event
                 ) ranked
                 WHERE ranked.rank > $1
             )",
        )
        .bind(keep)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_simple_event_defaults() {
        let event: SimpleEvent =
            serde_json::from_value(json!({ "person": "p1", "item": "1" })).unwrap();
        assert_eq!(event.event_type, "interaction");
        assert_eq!(event.weight, 1.0);
        assert!(event.date.is_none());
    }

    #[test]
    fn test_simple_event_explicit_type() {
        let event: SimpleEvent = serde_json::from_value(json!({
            "event": "purchase",
            "person": "p1",
            "item": "1",
            "weight": 2.5
        }))
        .unwrap();
        assert_eq!(event.event_type, "purchase");
        assert_eq!(event.weight, 2.5);
    }
}
