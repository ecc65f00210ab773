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

use grid_common::config::EnvMsDuration;
use grid_common::rpc::{Empty, TrackerHello};
use grid_tracker::config::Config;
use grid_tracker::server::serve;

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
pub const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub static DEFAULT_CONFIG: Lazy<Config> = Lazy::new(|| Config {
    host: "127.0.0.1".to_string(),
    port: 0,
    tracker_id: 0,
    host_id: 0,
    num_shards: 1,
    hash_width: 32,
    advertised_address: Some("127.0.0.1:32000".to_string()),
    history_path: None,
    safety_threshold: 0.1,
    unit_size: 0.00131,
    hello_delay: EnvMsDuration(Duration::ZERO),
    request_timeout: EnvMsDuration(Duration::from_secs(1)),
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
                .expect("tracker failed")
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

    pub async fn get(&self, path: &str) -> reqwest::Response {
        reqwest::Client::new()
            .get(format!("http://{}{}", self.addr, path))
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

/// A stand-in generator callback server that records every hello it receives.
pub struct HelloSink {
    pub addr: SocketAddr,
    pub hellos: Arc<Mutex<Vec<TrackerHello>>>,
    shutdown: Arc<Notify>,
}

impl HelloSink {
    pub async fn start() -> HelloSink {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hellos = Arc::new(Mutex::new(Vec::new()));
        let notify = Arc::new(Notify::new());
        let shutdown = notify.clone();

        let app = Router::new()
            .route("/hello", post(record_hello))
            .with_state(hellos.clone());

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { notify.notified().await })
                .await
                .unwrap()
        });
        HelloSink {
            addr,
            hellos,
            shutdown,
        }
    }

    pub fn received(&self) -> Vec<TrackerHello> {
        self.hellos.lock().unwrap().clone()
    }
}

impl Drop for HelloSink {
    fn drop(&mut self) {
        self.shutdown.notify_one()
    }
}

async fn record_hello(
    State(hellos): State<Arc<Mutex<Vec<TrackerHello>>>>,
    Json(hello): Json<TrackerHello>,
) -> Json<Empty> {
    hellos.lock().unwrap().push(hello);
    Json(Empty {})
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
