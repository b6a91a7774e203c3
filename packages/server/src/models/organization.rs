use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::Result;
use crate::models::ns_id;

/// A tenant. Owns collections.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Organization {
    pub id: i64,
    pub name: String,
    pub created: DateTime<Utc>,
}

impl Organization {
    pub async fn get_or_create(pool: &PgPool, name: &str) -> Result<Self> {
        sqlx::query(
            "INSERT INTO organization (id, name) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING",
        )
        .bind(ns_id())
        .bind(name)
        .execute(pool)
        .await?;

        let organization =
            sqlx::query_as::<_, Organization>("SELECT * FROM organization WHERE name = $1")
                .bind(name)
                .fetch_one(pool)
                .await?;

        Ok(organization)
    }
}
