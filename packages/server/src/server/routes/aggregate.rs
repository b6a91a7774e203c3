use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregate::{AggregationConfig, AggregationResult, Aggregator};
use crate::deps::Deps;
use crate::error::Result;
use crate::models::{Collection, Organization};

#[derive(Debug, Deserialize)]
pub struct AggregationRequest {
    pub collection: String,
    pub config: AggregationConfig,
}

#[derive(Debug, Serialize)]
pub struct AggregationResponse {
    pub aggregations: Vec<AggregationResult>,
    pub took_ms: u64,
}

pub async fn aggregate(
    State(deps): State<Deps>,
    Json(request): Json<AggregationRequest>,
) -> Result<Json<AggregationResponse>> {
    let begin = Instant::now();

    info!(collection = %request.collection, "received aggregation request");

    let organization = Organization::get_or_create(&deps.pool, &deps.settings.organization).await?;
    let collection =
        Collection::get_or_create(&deps.pool, organization.id, &request.collection).await?;

    let aggregator = Aggregator::new(&deps, &collection, &request.config)?;
    let aggregations = aggregator.aggregate().await?;

    Ok(Json(AggregationResponse {
        aggregations,
        took_ms: begin.elapsed().as_millis() as u64,
    }))
}
