use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use super::MessageResponse;
use crate::deps::Deps;
use crate::error::Result;
use crate::models::{Collection, Organization};

#[derive(Debug, Deserialize)]
pub struct CollectionConfigRequest {
    pub collection: String,
    pub config: Value,
}

#[derive(Debug, Deserialize)]
pub struct CollectionDeleteRequest {
    pub collection: String,
}

pub async fn update(
    State(deps): State<Deps>,
    Json(request): Json<CollectionConfigRequest>,
) -> Result<Json<MessageResponse>> {
    let organization = Organization::get_or_create(&deps.pool, &deps.settings.organization).await?;
    let mut collection =
        Collection::get_or_create(&deps.pool, organization.id, &request.collection).await?;

    collection.update_config(&deps.pool, &request.config).await?;

    Ok(Json(MessageResponse::new(format!(
        "collection {} has been configured",
        request.collection
    ))))
}

pub async fn delete(
    State(deps): State<Deps>,
    Json(request): Json<CollectionDeleteRequest>,
) -> Result<Json<MessageResponse>> {
    let organization = Organization::get_or_create(&deps.pool, &deps.settings.organization).await?;

    if let Some(collection) =
        Collection::get_by_name(&deps.pool, organization.id, &request.collection).await?
    {
        collection.delete(&deps.pool).await?;
    }

    Ok(Json(MessageResponse::new(format!(
        "collection {} has been deleted",
        request.collection
    ))))
}
