use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing, Router};
use grid_common::client::{RECEIVE_HELLO_PATH, SHUT_DOWN_PATH};
use grid_common::metrics::{maybe_add_metrics_route, track_metrics};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use super::rpc;
use crate::agent::GeneratorAgent;

pub fn add_routes(
    router: Router<Arc<GeneratorAgent>>,
    agent: Arc<GeneratorAgent>,
    concurrency_limit: usize,
    metrics: bool,
) -> Router {
    let router = router
        .route("/", routing::get(index))
        .route("/_liveness", routing::get(index))
        .route("/_readiness", routing::get(readiness))
        .route(RECEIVE_HELLO_PATH, routing::post(rpc::receive_hello))
        .route(SHUT_DOWN_PATH, routing::post(rpc::shut_down))
        .layer(ConcurrencyLimitLayer::new(concurrency_limit))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics));

    maybe_add_metrics_route(router, metrics).with_state(agent)
}

pub async fn index() -> &'static str {
    "grid generator"
}

/// Ready once a tracker has greeted the generator.
pub async fn readiness(State(agent): State<Arc<GeneratorAgent>>) -> (StatusCode, String) {
    match agent.assignment() {
        Some(assignment) => (
            StatusCode::OK,
            format!("tracker {}", assignment.tracker_id),
        ),
        None => (StatusCode::SERVICE_UNAVAILABLE, "awaiting hello".to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Method, Request},
    };
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::agent::tests::{agent, settings, StubBootstrap};

    fn generator() -> Arc<GeneratorAgent> {
        Arc::new(agent(
            settings(),
            Arc::new(StubBootstrap::new(7)),
            Arc::default(),
        ))
    }

    fn app(agent: Arc<GeneratorAgent>) -> Router {
        add_routes(Router::new(), agent, 16, false)
    }

    fn post(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn index() {
        let response = app(generator()).oneshot(get("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"grid generator");
    }

    #[tokio::test]
    async fn ready_once_greeted() {
        let agent = generator();

        let response = app(agent.clone())
            .oneshot(get("/_readiness"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = app(agent.clone())
            .oneshot(post(
                "/hello",
                json!({
                    "tracker_address": "127.0.0.1:32001",
                    "tracker_id": 1,
                    "generator_id": -77,
                    "kind": "hydroelectric",
                    "capacity": 100.0
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"{}");

        assert_eq!(agent.snapshot().await.identity, Some(-77));

        let response = app(agent).oneshot(get("/_readiness")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"tracker 1");
    }

    #[tokio::test]
    async fn shutdown_cancels_the_agent() {
        let agent = generator();

        let response = app(agent.clone())
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/shutdown")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(agent.cancellation().is_cancelled());

        let response = app(agent)
            .oneshot(post(
                "/hello",
                json!({
                    "tracker_address": "127.0.0.1:32001",
                    "tracker_id": 1,
                    "generator_id": -77,
                    "kind": "hydroelectric",
                    "capacity": 100.0
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn malformed_hello_is_rejected() {
        let response = app(generator())
            .oneshot(post("/hello", json!({"tracker_id": 1})))
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }
}
