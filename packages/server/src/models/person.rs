use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::PgPool;

use crate::error::Result;
use crate::models::ns_id;

/// A subject that emits events. Upserted implicitly by event ingest.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Person {
    pub id: i64,
    pub collection_id: i64,
    pub external_id: String,
    pub fields: Value,
    pub created: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

/// A person as submitted by clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimplePerson {
    pub id: String,

    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Person {
    pub async fn upsert(
        pool: &PgPool,
        collection_id: i64,
        person: &SimplePerson,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO person (id, collection_id, external_id, fields)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (collection_id, external_id)
             DO UPDATE SET fields = person.fields || EXCLUDED.fields, last_update = now()",
        )
        .bind(ns_id())
        .bind(collection_id)
        .bind(&person.id)
        .bind(Value::Object(person.fields.clone()))
        .execute(pool)
        .await?;
        Ok(())
    }
}
