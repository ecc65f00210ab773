use std::sync::Arc;

use axum::{routing, Router};
use grid_common::client::{CONSUMER_JOIN_PATH, GENERATOR_JOIN_PATH};
use grid_common::metrics::{maybe_add_metrics_route, track_metrics};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use super::join;
use crate::coordinator::BootstrapCoordinator;

pub fn add_routes(
    router: Router<Arc<BootstrapCoordinator>>,
    coordinator: Arc<BootstrapCoordinator>,
    concurrency_limit: usize,
    metrics: bool,
) -> Router {
    let router = router
        .route("/", routing::get(index))
        .route("/_readiness", routing::get(index))
        .route("/_liveness", routing::get(index))
        .route(GENERATOR_JOIN_PATH, routing::post(join::generator_join))
        .route(CONSUMER_JOIN_PATH, routing::post(join::consumer_join))
        .layer(ConcurrencyLimitLayer::new(concurrency_limit))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics));

    maybe_add_metrics_route(router, metrics).with_state(coordinator)
}

pub async fn index() -> &'static str {
    "grid bootstrap"
}
