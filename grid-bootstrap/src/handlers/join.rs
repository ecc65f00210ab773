use std::sync::Arc;

use axum::{extract::State, Json};
use grid_common::rpc::{
    ConsumerJoinRequest, ConsumerJoinResponse, GeneratorJoinRequest, GeneratorJoinResponse,
};
use tracing::instrument;

use crate::coordinator::BootstrapCoordinator;
use crate::error::BootstrapError;

#[instrument(skip_all, fields(address = %request.address))]
pub async fn generator_join(
    State(coordinator): State<Arc<BootstrapCoordinator>>,
    Json(request): Json<GeneratorJoinRequest>,
) -> Result<Json<GeneratorJoinResponse>, BootstrapError> {
    let identity = coordinator.generator_join(request).await?;
    Ok(Json(GeneratorJoinResponse { identity }))
}

#[instrument(skip_all, fields(address = %request.address))]
pub async fn consumer_join(
    State(coordinator): State<Arc<BootstrapCoordinator>>,
    Json(request): Json<ConsumerJoinRequest>,
) -> Result<Json<ConsumerJoinResponse>, BootstrapError> {
    let identity = coordinator.consumer_join(request).await?;
    Ok(Json(ConsumerJoinResponse { identity }))
}
