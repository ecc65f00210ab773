use std::future::Future;
use std::sync::Arc;

use axum::Router;
use grid_common::client::HttpRpcClient;
use grid_common::identity::IdentityIssuer;
use tokio::net::TcpListener;

use crate::audit::{AuditSink, JsonLinesAudit, MemoryAudit};
use crate::config::Config;
use crate::coordinator::BootstrapCoordinator;
use crate::error::ServeError;
use crate::handlers;

pub async fn build_coordinator(config: &Config) -> Result<BootstrapCoordinator, ServeError> {
    let ring = config.ring()?;

    let audit: Arc<dyn AuditSink> = match &config.audit_log_path {
        Some(path) => Arc::new(JsonLinesAudit::open(path).await?),
        None => Arc::new(MemoryAudit::default()),
    };

    let trackers = HttpRpcClient::new(config.request_timeout.0)?;

    for range in ring.ranges() {
        tracing::info!(
            "shard {} at {} owns identities {}",
            range.bucket,
            config.tracker_directory.get(range.bucket).unwrap_or("<none>"),
            range
        );
    }

    Ok(BootstrapCoordinator::new(
        IdentityIssuer::new(config.hash_seed),
        ring,
        config.tracker_directory.clone(),
        Arc::new(trackers),
        audit,
    )?)
}

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F) -> Result<(), ServeError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let coordinator = Arc::new(build_coordinator(&config).await?);

    let app = handlers::add_routes(
        Router::new(),
        coordinator.clone(),
        config.max_concurrent_requests,
        config.export_prometheus,
    );

    tracing::info!("listening on {:?}", listener.local_addr()?);
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;

    coordinator.drain().await;
    result?;

    tracing::info!("bootstrap stopped");
    Ok(())
}
