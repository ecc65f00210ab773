use envconfig::Envconfig;
use grid_common::shutdown::shutdown_signal;
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use grid_bootstrap::config::Config;
use grid_bootstrap::server::serve;

#[tokio::main]
async fn main() {
    let config = Config::init_from_env().expect("Invalid configuration:");

    let log_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(log_layer)
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    tracing::info!(
        "starting grid-bootstrap, {} tracker shards, hash width {}",
        config.num_shards(),
        config.hash_width
    );

    let listener = tokio::net::TcpListener::bind(config.bind())
        .await
        .expect("could not bind port");

    if let Err(e) = serve(config, listener, shutdown_signal(CancellationToken::new())).await {
        tracing::error!("bootstrap failed: {}", e);
        std::process::exit(1);
    }
}
