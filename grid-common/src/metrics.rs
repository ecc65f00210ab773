use std::future::ready;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use axum::{
    body::Body, extract::MatchedPath, http::Request, middleware::Next, response::IntoResponse,
    routing::get, Router,
};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Label used for requests that matched no route, so stray paths cannot grow the label set.
pub const UNMATCHED_PATH: &str = "unmatched";

static RECORDER: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

/// Installs the global prometheus recorder once per process and hands out its handle.
///
/// Callers are serialized, so routers built concurrently share one recorder.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    const EXPONENTIAL_SECONDS: &[f64] = &[
        0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    let mut recorder = RECORDER.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(handle) = recorder.as_ref() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets(EXPONENTIAL_SECONDS)?
        .install_recorder()?;
    *recorder = Some(handle.clone());
    Ok(handle)
}

/// Adds `/metrics` to `router` when `enabled`.
///
/// The recorder is global, so services used as a library (in tests) leave it off.
pub fn maybe_add_metrics_route<S>(router: Router<S>, enabled: bool) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    if !enabled {
        return router;
    }

    match setup_metrics_recorder() {
        Ok(recorder_handle) => {
            router.route("/metrics", get(move || ready(recorder_handle.render())))
        }
        Err(e) => {
            tracing::error!(
                "failed to install prometheus recorder, not exporting metrics: {}",
                e
            );
            router
        }
    }
}

/// Counts every RPC and records its latency, labelled by method, route pattern and status.
pub async fn track_metrics(req: Request<Body>, next: Next) -> impl IntoResponse {
    let started = Instant::now();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map_or(UNMATCHED_PATH, MatchedPath::as_str)
        .to_owned();
    let method = req.method().to_string();

    let response = next.run(req).await;

    let labels = [
        ("method", method),
        ("path", route),
        ("status", response.status().as_u16().to_string()),
    ];
    metrics::counter!("http_requests_total", &labels).increment(1);
    metrics::histogram!("http_requests_duration_seconds", &labels)
        .record(started.elapsed().as_secs_f64());

    response
}
