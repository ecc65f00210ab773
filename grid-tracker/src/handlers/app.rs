use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing, Router};
use grid_common::client::{REGISTER_GENERATOR_PATH, UPDATE_GENERATOR_STATE_PATH};
use grid_common::metrics::{maybe_add_metrics_route, track_metrics};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use super::rpc;
use crate::shard::{ShardStatus, TrackerShard};

pub fn add_routes(
    router: Router<Arc<TrackerShard>>,
    shard: Arc<TrackerShard>,
    concurrency_limit: usize,
    metrics: bool,
) -> Router {
    let router = router
        .route("/", routing::get(index))
        .route("/_liveness", routing::get(index))
        .route("/_readiness", routing::get(readiness))
        .route(REGISTER_GENERATOR_PATH, routing::post(rpc::register_generator))
        .route(
            UPDATE_GENERATOR_STATE_PATH,
            routing::post(rpc::update_generator_state),
        )
        .layer(ConcurrencyLimitLayer::new(concurrency_limit))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics));

    maybe_add_metrics_route(router, metrics).with_state(shard)
}

pub async fn index() -> &'static str {
    "grid tracker"
}

pub async fn readiness(State(shard): State<Arc<TrackerShard>>) -> (StatusCode, String) {
    match shard.status() {
        ShardStatus::Serving => (StatusCode::OK, ShardStatus::Serving.to_string()),
        status => (StatusCode::SERVICE_UNAVAILABLE, status.to_string()),
    }
}
