use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tracing::error;

use super::MessageResponse;
use crate::deps::Deps;
use crate::error::{Error, Result};
use crate::ingest;
use crate::models::{Collection, Organization, SimpleItem};

const MAX_BATCH: usize = 1_000_000;

#[derive(Debug, Deserialize)]
pub struct ItemsIngestRequest {
    pub collection: String,
    pub items: Vec<SimpleItem>,

    #[serde(default)]
    pub recalculate_vectors: bool,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub sync: bool,
}

#[derive(Debug, Deserialize)]
pub struct ItemsDeletionRequest {
    pub collection: String,
    pub ids: Vec<String>,

    #[serde(default)]
    pub sync: bool,
}

pub async fn ingest(
    State(deps): State<Deps>,
    Json(request): Json<ItemsIngestRequest>,
) -> Result<Json<MessageResponse>> {
    if request.items.len() > MAX_BATCH {
        return Err(Error::Validation(format!(
            "too many items to ingest at once, use batches of {MAX_BATCH}"
        )));
    }

    let organization = Organization::get_or_create(&deps.pool, &deps.settings.organization).await?;
    let mut collection =
        Collection::get_or_create(&deps.pool, organization.id, &request.collection).await?;

    if collection.config.embeddings_model.is_none() {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| deps.settings.default_embeddings_model.clone());
        collection
            .update_config(&deps.pool, &serde_json::json!({ "embeddings_model": model }))
            .await?;
    }

    if request.recalculate_vectors {
        sqlx::query("UPDATE item SET is_embeddings_dirty = TRUE WHERE collection_id = $1")
            .bind(collection.id)
            .execute(&deps.pool)
            .await?;
    }

    let count = request.items.len();

    if request.sync {
        ingest::ingest_items(&deps, &collection, &request.items, true).await?;
    } else {
        let deps = deps.clone();
        tokio::spawn(async move {
            if let Err(e) = ingest::ingest_items(&deps, &collection, &request.items, false).await {
                error!(collection = %collection.name, error = %e, "item ingestion failed");
            }
        });
    }

    Ok(Json(MessageResponse::new(format!(
        "scheduled {count} items for ingestion"
    ))))
}

pub async fn delete(
    State(deps): State<Deps>,
    Json(request): Json<ItemsDeletionRequest>,
) -> Result<Json<MessageResponse>> {
    let organization = Organization::get_or_create(&deps.pool, &deps.settings.organization).await?;
    let collection =
        Collection::get_or_create(&deps.pool, organization.id, &request.collection).await?;

    let count = request.ids.len();

    if request.sync {
        ingest::delete_items(&deps, &collection, &request.ids).await?;
    } else {
        let deps = deps.clone();
        tokio::spawn(async move {
            if let Err(e) = ingest::delete_items(&deps, &collection, &request.ids).await {
                error!(collection = %collection.name, error = %e, "item deletion failed");
            }
        });
    }

    Ok(Json(MessageResponse::new(format!(
        "scheduled {count} items for deletion"
    ))))
}
