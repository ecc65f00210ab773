use std::future::Future;
use std::sync::Arc;

use axum::Router;
use grid_common::client::HttpRpcClient;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::error::ServeError;
use crate::handlers;
use crate::history::HistoryLog;
use crate::shard::TrackerShard;

/// Builds the shard described by `config`, without starting to serve it.
pub fn build_shard(config: &Config) -> Result<Arc<TrackerShard>, ServeError> {
    let settings = config.shard_settings()?;

    let history = match &config.history_path {
        Some(path) => HistoryLog::create(path, settings.host_id, settings.tracker_id)?,
        None => HistoryLog::discard(settings.host_id, settings.tracker_id),
    };

    let generators = HttpRpcClient::new(config.request_timeout.0)?;

    Ok(Arc::new(TrackerShard::new(
        settings,
        history,
        Arc::new(generators),
    )))
}

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F) -> Result<(), ServeError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let shard = build_shard(&config)?;
    serve_shard(shard, &config, listener, shutdown).await
}

/// Serves `shard` until `shutdown` resolves, then drains it.
pub async fn serve_shard<F>(
    shard: Arc<TrackerShard>,
    config: &Config,
    listener: TcpListener,
    shutdown: F,
) -> Result<(), ServeError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let settings = shard.settings();
    tracing::info!(
        "tracker {} on host {} is responsible for identities {}",
        settings.tracker_id,
        settings.host_id,
        settings.range
    );

    let app = handlers::add_routes(
        Router::new(),
        shard.clone(),
        config.max_concurrent_requests,
        config.export_prometheus,
    );

    tracing::info!("listening on {:?}", listener.local_addr()?);
    shard.mark_serving();

    let stopping = shard.clone();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            stopping.mark_stopping();
        })
        .await;

    shard.drain().await?;
    result?;

    tracing::info!("tracker {} stopped", shard.settings().tracker_id);
    Ok(())
}
