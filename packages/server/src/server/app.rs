//! Router setup.

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::deps::Deps;
use crate::server::routes;

pub fn create_app(deps: Deps) -> Router {
    Router::new()
        .route(
            "/api/items",
            post(routes::items::ingest).delete(routes::items::delete),
        )
        .route(
            "/api/events",
            post(routes::events::ingest).delete(routes::events::delete),
        )
        .route(
            "/api/collections",
            put(routes::collections::update).delete(routes::collections::delete),
        )
        .route("/api/search", post(routes::search::search))
        .route("/api/aggregate", post(routes::aggregate::aggregate))
        .route("/api/suggest", post(routes::suggest::suggest))
        .route("/api/autocomplete", post(routes::autocomplete::autocomplete))
        .route("/api/health", get(routes::health::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(deps)
}
