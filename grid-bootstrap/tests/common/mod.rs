#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{extract::State, routing::post, Json, Router};
use once_cell::sync::Lazy;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use grid_bootstrap::config::Config;
use grid_bootstrap::server::serve;
use grid_common::config::{EnvMsDuration, TrackerDirectory};
use grid_common::rpc::{Empty, RegisterGeneratorRequest};

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
pub const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub static DEFAULT_CONFIG: Lazy<Config> = Lazy::new(|| Config {
    host: "127.0.0.1".to_string(),
    port: 0,
    hash_seed: 42,
    hash_width: 32,
    tracker_directory: "127.0.0.1:9".parse().unwrap(),
    request_timeout: EnvMsDuration(Duration::from_secs(1)),
    audit_log_path: None,
    max_concurrent_requests: 64,
    export_prometheus: false,
});

pub struct ServerHandle {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
}

impl ServerHandle {
    pub async fn for_config(config: Config) -> ServerHandle {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let notify = Arc::new(Notify::new());
        let shutdown = notify.clone();

        tokio::spawn(async move {
            serve(config, listener, async move { notify.notified().await })
                .await
                .expect("bootstrap failed")
        });
        ServerHandle { addr, shutdown }
    }

    pub async fn post<T: Serialize>(&self, path: &str, body: &T) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("http://{}{}", self.addr, path))
            .json(body)
            .send()
            .await
            .expect("failed to send request")
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown.notify_one()
    }
}

/// A fake tracker shard that records the registrations forwarded to it.
pub struct StubTracker {
    pub addr: SocketAddr,
    registrations: Arc<Mutex<Vec<RegisterGeneratorRequest>>>,
    shutdown: Arc<Notify>,
}

impl StubTracker {
    pub async fn start() -> StubTracker {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let registrations = Arc::new(Mutex::new(Vec::new()));
        let notify = Arc::new(Notify::new());
        let shutdown = notify.clone();

        let app = Router::new()
            .route("/generator/register", post(record_registration))
            .with_state(registrations.clone());

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { notify.notified().await })
                .await
                .unwrap()
        });
        StubTracker {
            addr,
            registrations,
            shutdown,
        }
    }

    pub fn received(&self) -> Vec<RegisterGeneratorRequest> {
        self.registrations.lock().unwrap().clone()
    }
}

impl Drop for StubTracker {
    fn drop(&mut self) {
        self.shutdown.notify_one()
    }
}

async fn record_registration(
    State(registrations): State<Arc<Mutex<Vec<RegisterGeneratorRequest>>>>,
    Json(request): Json<RegisterGeneratorRequest>,
) -> Json<Empty> {
    registrations.lock().unwrap().push(request);
    Json(Empty {})
}

pub fn directory(trackers: &[&StubTracker]) -> TrackerDirectory {
    TrackerDirectory::new(trackers.iter().map(|t| t.addr.to_string()).collect()).unwrap()
}

pub async fn wait_for_condition<F, Fut>(timeout: Duration, interval: Duration, f: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if f().await {
            return;
        }
        tokio::time::sleep(interval).await;
    }
    panic!("condition not met within {timeout:?}");
}
