use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use grid_common::identity::IdentityError;
use grid_common::ring::RingError;
use thiserror::Error;

use crate::audit::AuditError;

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("peer address must not be empty")]
    MissingAddress,
    #[error("capacity must be a finite, non-negative number of MW, got {0}")]
    InvalidCapacity(f64),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("shard lookup failed: {0}")]
    Ring(#[from] RingError),
    #[error("no tracker address configured for shard {0}")]
    MissingTracker(usize),
    #[error("tracker directory lists {trackers} addresses but the ring has {shards} shards")]
    DirectoryMismatch { shards: usize, trackers: usize },
}

impl IntoResponse for BootstrapError {
    fn into_response(self) -> Response {
        match self {
            BootstrapError::MissingAddress | BootstrapError::InvalidCapacity(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            BootstrapError::Identity(_)
            | BootstrapError::Ring(_)
            | BootstrapError::MissingTracker(_)
            | BootstrapError::DirectoryMismatch { .. } => {
                tracing::error!("bootstrap misconfigured: {}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        }
        .into_response()
    }
}

/// Errors that stop the bootstrap service from starting.
#[derive(Error, Debug)]
pub enum ServeError {
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    #[error(transparent)]
    Ring(#[from] RingError),
    #[error("failed to build tracker client: {0}")]
    Client(#[from] grid_common::client::RpcError),
    #[error(transparent)]
    Audit(#[from] AuditError),
    #[error("server failed: {0}")]
    Io(#[from] std::io::Error),
}
