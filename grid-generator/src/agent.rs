use std::sync::Arc;
use std::time::Duration;

use grid_common::client::{BootstrapClient, TrackerClient};
use grid_common::identity::GeneratorId;
use grid_common::rpc::{GeneratorJoinRequest, GeneratorKind, StateUpdate, TrackerHello};
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::GeneratorError;
use crate::mutation::{OutputModel, OutputMutator};

#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Callback address the tracker greets.
    pub advertised_address: String,
    pub bootstrap_address: String,
    pub kind: GeneratorKind,
    pub capacity: f64,
    pub initial_demand_ratio: f64,
    /// Delay added before every report.
    pub simulated_rtt: Duration,
    pub refresh_interval: Duration,
    pub hello_timeout: Duration,
}

/// The tracker shard that greeted this generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub tracker_id: usize,
    pub tracker_address: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentSnapshot {
    pub identity: Option<GeneratorId>,
    pub timestamp: u64,
    pub output: f64,
    pub demand: f64,
}

struct AgentState {
    identity: Option<GeneratorId>,
    mutator: OutputMutator,
    demand: f64,
}

/// A simulated generator: joins the grid, waits for its tracker's hello, then reports its
/// output on every refresh and takes on whatever demand the tracker hands back.
pub struct GeneratorAgent {
    settings: AgentSettings,
    state: Mutex<AgentState>,
    assignment: watch::Sender<Option<Assignment>>,
    bootstrap: Arc<dyn BootstrapClient>,
    trackers: Arc<dyn TrackerClient>,
    cancel: CancellationToken,
}

impl GeneratorAgent {
    pub fn new(
        settings: AgentSettings,
        model: Box<dyn OutputModel>,
        bootstrap: Arc<dyn BootstrapClient>,
        trackers: Arc<dyn TrackerClient>,
        cancel: CancellationToken,
    ) -> Self {
        let state = AgentState {
            identity: None,
            mutator: OutputMutator::new(settings.capacity, model),
            demand: settings.capacity * settings.initial_demand_ratio,
        };
        let (assignment, _) = watch::channel(None);

        Self {
            settings,
            state: Mutex::new(state),
            assignment,
            bootstrap,
            trackers,
            cancel,
        }
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn assignment(&self) -> Option<Assignment> {
        self.assignment.borrow().clone()
    }

    pub async fn snapshot(&self) -> AgentSnapshot {
        let state = self.state.lock().await;
        AgentSnapshot {
            identity: state.identity,
            timestamp: state.mutator.timestamp(),
            output: state.mutator.output(),
            demand: state.demand,
        }
    }

    pub fn shut_down(&self) {
        if !self.cancel.is_cancelled() {
            info!("shutdown requested");
        }
        self.cancel.cancel();
    }

    /// Adopts the identity and shard assignment a tracker greets this generator with.
    pub async fn receive_hello(&self, hello: TrackerHello) -> Result<(), GeneratorError> {
        if self.cancel.is_cancelled() {
            return Err(GeneratorError::ShuttingDown);
        }

        if hello.kind != self.settings.kind {
            warn!(
                ours = %self.settings.kind,
                theirs = %hello.kind,
                "tracker has a different kind on record"
            );
        }
        if hello.capacity != self.settings.capacity {
            warn!(
                ours = self.settings.capacity,
                theirs = hello.capacity,
                "tracker has a different capacity on record"
            );
        }

        {
            let mut state = self.state.lock().await;
            if let Some(previous) = state.identity.filter(|id| *id != hello.generator_id) {
                warn!(previous, adopted = hello.generator_id, "tracker sent a new identity");
            }
            state.identity = Some(hello.generator_id);
        }

        info!(
            identity = hello.generator_id,
            tracker_id = hello.tracker_id,
            tracker = %hello.tracker_address,
            "greeted by tracker"
        );
        self.assignment.send_replace(Some(Assignment {
            tracker_id: hello.tracker_id,
            tracker_address: hello.tracker_address,
        }));
        Ok(())
    }

    /// Asks the bootstrap service for an identity.
    pub async fn join(&self) -> Result<GeneratorId, GeneratorError> {
        let request = GeneratorJoinRequest {
            address: self.settings.advertised_address.clone(),
            kind: self.settings.kind,
            capacity: self.settings.capacity,
        };
        let identity = self
            .bootstrap
            .generator_join(&self.settings.bootstrap_address, request)
            .await
            .map_err(GeneratorError::Join)?;

        let mut state = self.state.lock().await;
        match state.identity {
            // The tracker's hello can overtake the join response.
            Some(adopted) if adopted != identity => {
                warn!(identity, adopted, "keeping the identity sent by the tracker");
            }
            Some(_) => {}
            None => state.identity = Some(identity),
        }

        info!(
            identity,
            bootstrap = %self.settings.bootstrap_address,
            "joined the grid"
        );
        Ok(identity)
    }

    /// Waits until a tracker has greeted this generator.
    pub async fn wait_for_hello(&self) -> Result<Assignment, GeneratorError> {
        let mut assignment = self.assignment.subscribe();
        let greeted = async {
            let current = assignment.wait_for(Option::is_some).await;
            current.ok().and_then(|current| current.clone())
        };

        tokio::select! {
            _ = self.cancel.cancelled() => Err(GeneratorError::ShuttingDown),
            greeted = tokio::time::timeout(self.settings.hello_timeout, greeted) => match greeted {
                Ok(Some(assignment)) => Ok(assignment),
                Ok(None) => Err(GeneratorError::ShuttingDown),
                Err(_) => Err(GeneratorError::HelloTimeout(self.settings.hello_timeout)),
            },
        }
    }

    /// Mutates the simulated output, reports it to `tracker` and applies the demand it returns.
    pub async fn report(&self, tracker: &str) -> Result<f64, GeneratorError> {
        let update = {
            let mut state = self.state.lock().await;
            let identity = state.identity.ok_or(GeneratorError::NotJoined)?;
            let (timestamp, output) = state.mutator.mutate();
            StateUpdate {
                identity,
                timestamp,
                output,
                demand: state.demand,
            }
        };

        if !self.settings.simulated_rtt.is_zero() {
            tokio::time::sleep(self.settings.simulated_rtt).await;
        }

        let response = self
            .trackers
            .update_generator_state(tracker, update)
            .await
            .map_err(GeneratorError::Report)?;
        if !response.demand.is_finite() {
            return Err(GeneratorError::InvalidDemand(response.demand));
        }

        self.state.lock().await.demand = response.demand;
        metrics::counter!("grid_generator_reports_total").increment(1);
        debug!(
            identity = update.identity,
            timestamp = update.timestamp,
            output = update.output,
            reported = update.demand,
            assigned = response.demand,
            "report acknowledged"
        );

        Ok(response.demand)
    }

    /// Joins, waits for a hello and reports on every refresh until cancelled.
    ///
    /// A failed report is logged and retried on the next refresh.
    pub async fn run(&self) -> Result<(), GeneratorError> {
        let joined = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(()),
            joined = self.join() => joined,
        };
        joined?;

        match self.wait_for_hello().await {
            Ok(_) => {}
            Err(GeneratorError::ShuttingDown) => return Ok(()),
            Err(e) => return Err(e),
        }

        loop {
            let Some(tracker) = self.assignment().map(|a| a.tracker_address) else {
                return Err(GeneratorError::NotJoined);
            };

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                reported = self.report(&tracker) => {
                    if let Err(e) = reported {
                        metrics::counter!("grid_generator_report_failures_total").increment(1);
                        warn!(%tracker, "{}", e);
                    }
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.settings.refresh_interval) => {}
            }
        }

        info!("stopped reporting");
        Ok(())
    }
}
