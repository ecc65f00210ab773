#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::post, Json, Router};
use once_cell::sync::Lazy;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use grid_common::config::EnvMsDuration;
use grid_common::identity::GeneratorId;
use grid_common::rpc::{GeneratorJoinResponse, GeneratorKind};
use grid_generator::agent::GeneratorAgent;
use grid_generator::config::Config;
use grid_generator::error::ServeError;
use grid_generator::server::{build_agent, serve_agent};
use grid_tracker::shard::TrackerShard;

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
pub const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub static DEFAULT_CONFIG: Lazy<Config> = Lazy::new(|| Config {
    host: "127.0.0.1".to_string(),
    port: 0,
    advertised_address: None,
    bootstrap_address: "127.0.0.1:9".to_string(),
    kind: GeneratorKind::LandBasedWind,
    capacity: 80.0,
    simulated_rtt: EnvMsDuration(Duration::ZERO),
    refresh_interval: EnvMsDuration(Duration::from_millis(20)),
    initial_demand_ratio: 0.75,
    output_config_path: None,
    mutation_seed: Some(36921),
    hello_timeout: EnvMsDuration(Duration::from_secs(5)),
    request_timeout: EnvMsDuration(Duration::from_secs(1)),
    max_concurrent_requests: 64,
    export_prometheus: false,
});

/// A generator served on an ephemeral port, advertising that port as its callback address.
pub struct GeneratorHandle {
    pub addr: SocketAddr,
    pub agent: Arc<GeneratorAgent>,
    pub task: JoinHandle<Result<(), ServeError>>,
    shutdown: Arc<Notify>,
}

impl GeneratorHandle {
    pub async fn for_config(mut config: Config) -> GeneratorHandle {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        config.port = addr.port();
        config.advertised_address = Some(addr.to_string());

        let agent = build_agent(&config).unwrap();
        let notify = Arc::new(Notify::new());
        let shutdown = notify.clone();

        let task = tokio::spawn({
            let agent = agent.clone();
            async move {
                serve_agent(agent, &config, listener, async move {
                    notify.notified().await
                })
                .await
            }
        });
        GeneratorHandle {
            addr,
            agent,
            task,
            shutdown,
        }
    }

    pub async fn post(&self, path: &str) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("http://{}{}", self.addr, path))
            .json(&serde_json::json!({}))
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

    /// Resolves the shutdown future the generator was served with.
    pub fn signal_shutdown(&self) {
        self.shutdown.notify_one()
    }

    /// Waits for the generator to stop and returns how it ended.
    pub async fn stopped(self) -> Result<(), ServeError> {
        let task = tokio::time::timeout(WAIT_TIMEOUT, self.task);
        task.await
            .expect("generator did not stop")
            .expect("generator task panicked")
    }
}

/// A tracker shard owning the whole identity space.
pub struct TrackerHandle {
    pub addr: SocketAddr,
    pub shard: Arc<TrackerShard>,
    shutdown: Arc<Notify>,
}

impl TrackerHandle {
    pub async fn start() -> TrackerHandle {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let config = grid_tracker::config::Config {
            host: "127.0.0.1".to_string(),
            port: addr.port(),
            tracker_id: 0,
            host_id: 0,
            num_shards: 1,
            hash_width: 32,
            advertised_address: Some(addr.to_string()),
            history_path: None,
            safety_threshold: 0.1,
            unit_size: 0.00131,
            hello_delay: EnvMsDuration(Duration::from_millis(10)),
            request_timeout: EnvMsDuration(Duration::from_secs(1)),
            max_concurrent_requests: 64,
            export_prometheus: false,
        };
        let shard = grid_tracker::server::build_shard(&config).unwrap();
        let notify = Arc::new(Notify::new());
        let shutdown = notify.clone();

        tokio::spawn({
            let shard = shard.clone();
            async move {
                grid_tracker::server::serve_shard(shard, &config, listener, async move {
                    notify.notified().await
                })
                .await
                .expect("tracker failed")
            }
        });
        TrackerHandle {
            addr,
            shard,
            shutdown,
        }
    }
}

impl Drop for TrackerHandle {
    fn drop(&mut self) {
        self.shutdown.notify_one()
    }
}

/// A bootstrap service routing every generator to `tracker`.
pub struct BootstrapHandle {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
}

impl BootstrapHandle {
    pub async fn start(tracker: SocketAddr) -> BootstrapHandle {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let config = grid_bootstrap::config::Config {
            host: "127.0.0.1".to_string(),
            port: addr.port(),
            hash_seed: 42,
            hash_width: 32,
            tracker_directory: tracker.to_string().parse().unwrap(),
            request_timeout: EnvMsDuration(Duration::from_secs(1)),
            audit_log_path: None,
            max_concurrent_requests: 64,
            export_prometheus: false,
        };
        let notify = Arc::new(Notify::new());
        let shutdown = notify.clone();

        tokio::spawn(async move {
            grid_bootstrap::server::serve(config, listener, async move {
                notify.notified().await
            })
            .await
            .expect("bootstrap failed")
        });
        BootstrapHandle { addr, shutdown }
    }
}

impl Drop for BootstrapHandle {
    fn drop(&mut self) {
        self.shutdown.notify_one()
    }
}

/// A bootstrap service that hands out `identity` and never forwards the registration.
pub async fn silent_bootstrap(identity: GeneratorId) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = Router::new().route(
        "/generator/join",
        post(move || async move { Json(GeneratorJoinResponse { identity }) }),
    );
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    addr
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
