use std::sync::Arc;

use axum::{extract::State, Json};
use grid_common::rpc::{Empty, TrackerHello};
use tracing::instrument;

use crate::agent::GeneratorAgent;
use crate::error::GeneratorError;

#[instrument(skip_all, fields(identity = hello.generator_id, tracker_id = hello.tracker_id))]
pub async fn receive_hello(
    State(agent): State<Arc<GeneratorAgent>>,
    Json(hello): Json<TrackerHello>,
) -> Result<Json<Empty>, GeneratorError> {
    agent.receive_hello(hello).await?;
    Ok(Json(Empty {}))
}

pub async fn shut_down(State(agent): State<Arc<GeneratorAgent>>) -> Json<Empty> {
    agent.shut_down();
    Json(Empty {})
}
