use axum::{middleware, routing::get, Json, Router};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use common::types::Health;

use crate::actor::extract_actor;
use crate::observability;

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

/// Compose health, metrics and every entity router under `/api/<path>`.
pub fn build_router(entities: Vec<(String, Router)>, cors: CorsLayer) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(observability::metrics));

    let api = entities
        .into_iter()
        .fold(Router::new(), |api, (path, router)| api.nest(&format!("/api/{path}"), router));

    public
        .merge(api)
        .layer(middleware::from_fn(extract_actor))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                // one INFO span per request with method and path
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_request(
                    DefaultOnRequest::new()
                        .level(Level::INFO),
                )
                // status code and latency
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                // 5xx at ERROR
                .on_failure(
                    DefaultOnFailure::new()
                        .level(Level::ERROR),
                )
        )
}
