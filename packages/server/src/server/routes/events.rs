use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tracing::error;

use super::MessageResponse;
use crate::deps::Deps;
use crate::error::{Error, Result};
use crate::ingest;
use crate::models::{Collection, Event, Organization, SimpleEvent};

const MAX_BATCH: usize = 1_000_000;

#[derive(Debug, Deserialize)]
pub struct EventsIngestRequest {
    pub collection: String,
    pub events: Vec<SimpleEvent>,
}

#[derive(Debug, Deserialize)]
pub struct EventsResetRequest {
    pub collection: String,
}

pub async fn ingest(
    State(deps): State<Deps>,
    Json(request): Json<EventsIngestRequest>,
) -> Result<Json<MessageResponse>> {
    if request.events.len() > MAX_BATCH {
        return Err(Error::Validation(format!(
            "too many events to ingest at once, use batches of {MAX_BATCH}"
        )));
    }

    let organization = Organization::get_or_create(&deps.pool, &deps.settings.organization).await?;
    let collection =
        Collection::get_or_create(&deps.pool, organization.id, &request.collection).await?;

    let count = request.events.len();

    let deps = deps.clone();
    tokio::spawn(async move {
        if let Err(e) = ingest::ingest_events(&deps, &collection, &request.events).await {
            error!(collection = %collection.name, error = %e, "event ingestion failed");
        }
    });

    Ok(Json(MessageResponse::new(format!(
        "scheduled {count} events for ingestion"
    ))))
}

pub async fn delete(
    State(deps): State<Deps>,
    Json(request): Json<EventsResetRequest>,
) -> Result<Json<MessageResponse>> {
    let organization = Organization::get_or_create(&deps.pool, &deps.settings.organization).await?;
    let collection =
        Collection::get_or_create(&deps.pool, organization.id, &request.collection).await?;

    Event::delete_of_collection(&deps.pool, collection.id).await?;

    Ok(Json(MessageResponse::new(format!(
        "collection {} events have been flushed",
        request.collection
    ))))
}
