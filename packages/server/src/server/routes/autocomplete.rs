use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::deps::Deps;
use crate::error::Result;
use crate::models::{Collection, Organization};
use crate::search::types::SearchItem;
use crate::suggest::types::AutoCompleteConfig;
use crate::suggest::AutoCompletor;

#[derive(Debug, Deserialize)]
pub struct AutocompleteRequest {
    pub collection: String,
    pub config: AutoCompleteConfig,
}

#[derive(Debug, Serialize)]
pub struct AutocompleteResponse {
    pub suggestions: Vec<SearchItem>,
    pub took_ms: u64,
}

pub async fn autocomplete(
    State(deps): State<Deps>,
    Json(request): Json<AutocompleteRequest>,
) -> Result<Json<AutocompleteResponse>> {
    let begin = Instant::now();

    info!(collection = %request.collection, "received autocomplete request");

    let organization = Organization::get_or_create(&deps.pool, &deps.settings.organization).await?;
    let collection =
        Collection::get_or_create(&deps.pool, organization.id, &request.collection).await?;

    let completor = AutoCompletor::new(&deps, &collection, &request.config);
    let suggestions = completor.autocomplete().await?;

    Ok(Json(AutocompleteResponse {
        suggestions,
        took_ms: begin.elapsed().as_millis() as u64,
    }))
}
