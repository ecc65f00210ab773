use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use grid_common::client::RpcError;
use thiserror::Error;

use crate::config::SettingsError;
use crate::mutation::MutationError;

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("failed to join through the bootstrap service: {0}")]
    Join(RpcError),
    #[error("no tracker greeted this generator within {0:?}")]
    HelloTimeout(Duration),
    #[error("generator has no identity yet")]
    NotJoined,
    #[error("state report failed: {0}")]
    Report(RpcError),
    #[error("tracker answered with an invalid demand {0}")]
    InvalidDemand(f64),
    #[error("generator is shutting down")]
    ShuttingDown,
}

impl IntoResponse for GeneratorError {
    fn into_response(self) -> Response {
        match self {
            GeneratorError::ShuttingDown => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        }
        .into_response()
    }
}

/// Errors that stop a generator from starting or end its run early.
#[derive(Error, Debug)]
pub enum ServeError {
    #[error("invalid generator settings: {0}")]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Model(#[from] MutationError),
    #[error("failed to build rpc client: {0}")]
    Client(#[from] RpcError),
    #[error("server failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("generator stopped: {0}")]
    Agent(#[from] GeneratorError),
}
