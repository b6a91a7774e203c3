use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use sqlx::PgPool;

use crate::error::Result;
use crate::models::ns_id;

/// Per-collection person field metadata; the persons-side twin of
/// `items_field`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PersonsField {
    pub id: i64,
    pub collection_id: i64,
    pub field_name: String,
    pub field_label: String,
    #[sqlx(rename = "type")]
    pub field_type: String,
    pub field_order: i64,
    pub created: DateTime<Utc>,
}

impl PersonsField {
    pub async fn of_collection(pool: &PgPool, collection_id: i64) -> Result<Vec<PersonsField>> {
        let fields = sqlx::query_as::<_, PersonsField>(
            "SELECT * FROM persons_field WHERE collection_id = $1 ORDER BY field_order",
        )
        .bind(collection_id)
        .fetch_all(pool)
        .await?;
        Ok(fields)
    }

    pub async fn create_missing(
        pool: &PgPool,
        collection_id: i64,
        field_types: &IndexMap<String, &'static str>,
    ) -> Result<()> {
        let existing = Self::of_collection(pool, collection_id).await?;
        let mut last_order = existing.iter().map(|f| f.field_order).max().unwrap_or(0);
        let existing_names: Vec<&str> =
            existing.iter().map(|f| f.field_name.as_str()).collect();

        for (name, field_type) in field_types {
            if existing_names.contains(&name.as_str()) {
                continue;
            }
            last_order += 1;

            sqlx::query(
                "INSERT INTO persons_field (id, collection_id, field_name, field_label, type, field_order)
                 VALUES ($1, $2, $3, $3, $4, $5)
                 ON CONFLICT (collection_id, field_name) DO NOTHING",
            )
            .bind(ns_id())
            .bind(collection_id)
            .bind(name)
            .bind(field_type)
            .bind(last_order)
            .execute(pool)
            .await?;
        }

        Ok(())
    }
}
