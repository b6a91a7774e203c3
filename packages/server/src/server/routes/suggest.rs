use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::deps::Deps;
use crate::error::Result;
use crate::models::Organization;
use crate::suggest::types::{SuggestConfig, Suggestion};
use crate::suggest::Suggestor;

#[derive(Debug, Deserialize)]
pub struct SuggestionsRequest {
    pub config: SuggestConfig,
}

#[derive(Debug, Serialize)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<Suggestion>,
    pub took_ms: u64,
}

pub async fn suggest(
    State(deps): State<Deps>,
    Json(request): Json<SuggestionsRequest>,
) -> Result<Json<SuggestionsResponse>> {
    let begin = Instant::now();

    info!("received suggestion request");

    let organization = Organization::get_or_create(&deps.pool, &deps.settings.organization).await?;

    let suggestor = Suggestor::new(&deps, organization.id, &request.config);
    let suggestions = suggestor.suggest().await?;

    Ok(Json(SuggestionsResponse {
        suggestions,
        took_ms: begin.elapsed().as_millis() as u64,
    }))
}
