use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use grid_common::identity::GeneratorId;
use thiserror::Error;

use crate::history::HistoryError;
use crate::shard::ShardStatus;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("shard is {0}, not serving")]
    NotServing(ShardStatus),
    #[error("generator {0} has no state row")]
    MissingState(GeneratorId),
    #[error("{0} must be a finite number, got {1}")]
    InvalidFigure(&'static str, f64),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error("history writer failed: {0}")]
    HistoryTask(#[from] tokio::task::JoinError),
    #[error("history log was lost by an earlier failed write")]
    HistoryUnavailable,
}

impl IntoResponse for TrackerError {
    fn into_response(self) -> Response {
        match self {
            TrackerError::NotServing(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            TrackerError::InvalidFigure(..) => (StatusCode::BAD_REQUEST, self.to_string()),
            TrackerError::MissingState(_)
            | TrackerError::History(_)
            | TrackerError::HistoryTask(_)
            | TrackerError::HistoryUnavailable => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        }
        .into_response()
    }
}

/// Errors that stop a tracker from starting or from shutting down cleanly.
#[derive(Error, Debug)]
pub enum ServeError {
    #[error("invalid shard settings: {0}")]
    Settings(#[from] crate::config::SettingsError),
    #[error("failed to build generator client: {0}")]
    Client(#[from] grid_common::client::RpcError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error("server failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("shard failed to drain: {0}")]
    Drain(#[from] TrackerError),
}
