use std::sync::Arc;

use axum::{extract::State, Json};
use grid_common::rpc::{DemandUpdate, Empty, RegisterGeneratorRequest, StateUpdate};
use tracing::instrument;

use crate::error::TrackerError;
use crate::shard::TrackerShard;

#[instrument(skip_all, fields(identity = request.identity))]
pub async fn register_generator(
    State(shard): State<Arc<TrackerShard>>,
    Json(request): Json<RegisterGeneratorRequest>,
) -> Result<Json<Empty>, TrackerError> {
    shard.register_generator(request).await?;
    Ok(Json(Empty {}))
}

#[instrument(skip_all, fields(identity = update.identity, timestamp = update.timestamp))]
pub async fn update_generator_state(
    State(shard): State<Arc<TrackerShard>>,
    Json(update): Json<StateUpdate>,
) -> Result<Json<DemandUpdate>, TrackerError> {
    let report = shard.update_generator_state(update).await?;
    Ok(Json(DemandUpdate {
        demand: report.new_demand,
    }))
}
