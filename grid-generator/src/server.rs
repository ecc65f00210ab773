use std::future::Future;
use std::sync::Arc;

use axum::Router;
use grid_common::client::HttpRpcClient;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::agent::GeneratorAgent;
use crate::config::Config;
use crate::error::ServeError;
use crate::handlers;
use crate::mutation::load_model;

/// Builds the agent described by `config`, without starting it.
pub fn build_agent(config: &Config) -> Result<Arc<GeneratorAgent>, ServeError> {
    let settings = config.agent_settings()?;
    let model = load_model(
        config.output_config_path.as_deref(),
        settings.kind,
        config.mutation_seed,
    )?;
    let client = Arc::new(HttpRpcClient::new(config.request_timeout.0)?);

    Ok(Arc::new(GeneratorAgent::new(
        settings,
        model,
        client.clone(),
        client,
        CancellationToken::new(),
    )))
}

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F) -> Result<(), ServeError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let agent = build_agent(&config)?;
    serve_agent(agent, &config, listener, shutdown).await
}

/// Serves the hello and shutdown callbacks while the agent runs.
///
/// Stops when `shutdown` resolves, when a `ShutDown` call arrives, or when the agent fails.
pub async fn serve_agent<F>(
    agent: Arc<GeneratorAgent>,
    config: &Config,
    listener: TcpListener,
    shutdown: F,
) -> Result<(), ServeError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let cancel = agent.cancellation().clone();
    let settings = agent.settings();
    tracing::info!(
        "{} generator of {} MW calling back on {}",
        settings.kind,
        settings.capacity,
        settings.advertised_address
    );

    let app = handlers::add_routes(
        Router::new(),
        agent.clone(),
        config.max_concurrent_requests,
        config.export_prometheus,
    );

    tracing::info!("listening on {:?}", listener.local_addr()?);

    let stopped = cancel.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        tokio::select! {
            _ = shutdown => stopped.cancel(),
            _ = stopped.cancelled() => {},
        }
    });

    let running = async {
        let result = agent.run().await;
        cancel.cancel();
        result
    };

    let (served, ran) = tokio::join!(async { server.await }, running);
    served?;
    ran?;

    let last = agent.snapshot().await;
    tracing::info!(
        identity = last.identity,
        timestamp = last.timestamp,
        output = last.output,
        demand = last.demand,
        "generator stopped"
    );
    Ok(())
}
