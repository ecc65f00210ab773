use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Resolves on SIGTERM or SIGINT, or when `cancel` fires.
///
/// Falls back to ctrl-c alone when the unix handlers cannot be registered.
pub async fn shutdown_signal(cancel: CancellationToken) {
    let term = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to register SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = term => {},
        _ = interrupt => {},
        _ = cancel.cancelled() => {},
    };

    tracing::info!("Shutting down gracefully...");
    cancel.cancel();
}
