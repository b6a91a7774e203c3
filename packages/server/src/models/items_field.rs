use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::Value;
use sqlx::PgPool;
use tracing::warn;

use crate::error::Result;
use crate::models::ns_id;

/// Per-collection field metadata, created lazily when ingest first sees a
/// field name.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ItemsField {
    pub id: i64,
    pub collection_id: i64,
    pub field_name: String,
    pub field_label: String,
    #[sqlx(rename = "type")]
    pub field_type: String,
    pub field_order: i64,
    pub created: DateTime<Utc>,
}

pub const DEFAULT_VALUE_TYPE: &str = "string";

/// Infer the schema type of a field from the first value seen for it.
pub fn best_fit_value_type(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "boolean",
        Value::String(_) => "string",
        Value::Number(_) => "number",
        _ => DEFAULT_VALUE_TYPE,
    }
}

impl ItemsField {
    pub async fn of_collection(pool: &PgPool, collection_id: i64) -> Result<Vec<ItemsField>> {
        let fields = sqlx::query_as::<_, ItemsField>(
            "SELECT * FROM items_field WHERE collection_id = $1 ORDER BY field_order",
        )
        .bind(collection_id)
        .fetch_all(pool)
        .await?;
        Ok(fields)
    }

    /// Insert metadata rows for field names not seen before. The inferred
    /// type of the first value wins; ordinals continue from the last row.
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

            let inserted = sqlx::query(
                "INSERT INTO items_field (id, collection_id, field_name, field_label, type, field_order)
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

            if inserted.rows_affected() == 0 {
                warn!(field = %name, "items_field exists, skipping");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_best_fit_value_type() {
        assert_eq!(best_fit_value_type(&json!(true)), "boolean");
        assert_eq!(best_fit_value_type(&json!("opel")), "string");
        assert_eq!(best_fit_value_type(&json!(3000)), "number");
        assert_eq!(best_fit_value_type(&json!(2.5)), "number");
        assert_eq!(best_fit_value_type(&json!(["a"])), "string");
    }
}
