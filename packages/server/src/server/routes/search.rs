use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::common::vars::Context;
use crate::deps::Deps;
use crate::error::Result;
use crate::models::{Collection, Organization};
use crate::search::types::{SearchConfig, SearchItem};
use crate::search::Searcher;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub collection: String,
    pub config: SearchConfig,

    #[serde(default)]
    pub context: Context,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub items: Vec<SearchItem>,
    pub id: Option<i64>,
    pub took_ms: u64,
}

pub async fn search(
    State(deps): State<Deps>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let begin = Instant::now();

    info!(collection = %request.collection, "received search request");

    let organization = Organization::get_or_create(&deps.pool, &deps.settings.organization).await?;
    let collection =
        Collection::get_or_create(&deps.pool, organization.id, &request.collection).await?;

    let searcher = Searcher::new(&deps, &collection);
    let result = searcher.search(&request.config, &request.context).await?;

    Ok(Json(SearchResponse {
        items: result.items,
        id: result.id,
        took_ms: begin.elapsed().as_millis() as u64,
    }))
}
