use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use grid_common::client::GeneratorClient;
use grid_common::identity::GeneratorId;
use grid_common::ring::BucketRange;
use grid_common::rpc::{RegisterGeneratorRequest, StateUpdate, TrackerHello};
use time::OffsetDateTime;
use tokio::sync::{watch, Mutex};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::balancer::{balance, BalanceParams, BalanceReport};
use crate::error::TrackerError;
use crate::history::{HistoryError, HistoryLog};
use crate::state::{GeneratorRecord, GeneratorState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardStatus {
    Stopped,
    Serving,
    Stopping,
}

impl fmt::Display for ShardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShardStatus::Stopped => f.write_str("stopped"),
            ShardStatus::Serving => f.write_str("serving"),
            ShardStatus::Stopping => f.write_str("stopping"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShardSettings {
    pub tracker_id: usize,
    pub host_id: u32,
    /// Address generators are told to report to.
    pub advertised_address: String,
    pub range: BucketRange,
    pub balance: BalanceParams,
    pub hello_delay: Duration,
}

struct ShardTable {
    records: HashMap<GeneratorId, GeneratorRecord>,
    states: HashMap<GeneratorId, GeneratorState>,
    /// Lent to the blocking pool while a write is in flight.
    history: Option<HistoryLog>,
}

impl ShardTable {
    /// Runs `op` against the history log on the blocking pool. Rows stay in arrival order
    /// because the caller holds the table across the call.
    async fn with_history<F>(&mut self, op: F) -> Result<(), TrackerError>
    where
        F: FnOnce(&mut HistoryLog) -> Result<(), HistoryError> + Send + 'static,
    {
        let mut history = self.history.take().ok_or(TrackerError::HistoryUnavailable)?;
        let (history, result) = tokio::task::spawn_blocking(move || {
            let result = op(&mut history);
            (history, result)
        })
        .await?;
        self.history = Some(history);
        result.map_err(TrackerError::from)
    }
}

/// Live state of every generator owned by one partition of the identity space.
///
/// All reads and writes of the table go through one lock: balancing looks at every row, so
/// updates for different generators are serialized.
pub struct TrackerShard {
    settings: ShardSettings,
    table: Mutex<ShardTable>,
    status: watch::Sender<ShardStatus>,
    generators: Arc<dyn GeneratorClient>,
    hellos: TaskTracker,
}

impl TrackerShard {
    pub fn new(
        settings: ShardSettings,
        history: HistoryLog,
        generators: Arc<dyn GeneratorClient>,
    ) -> Self {
        let (status, _) = watch::channel(ShardStatus::Stopped);
        Self {
            settings,
            table: Mutex::new(ShardTable {
                records: HashMap::new(),
                states: HashMap::new(),
                history: Some(history),
            }),
            status,
            generators,
            hellos: TaskTracker::new(),
        }
    }

    pub fn settings(&self) -> &ShardSettings {
        &self.settings
    }

    pub fn status(&self) -> ShardStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ShardStatus> {
        self.status.subscribe()
    }

    pub fn mark_serving(&self) {
        self.set_status(ShardStatus::Serving);
    }

    pub fn mark_stopping(&self) {
        self.set_status(ShardStatus::Stopping);
    }

    /// Waits for pending hellos, flushes the history log and marks the shard stopped.
    pub async fn drain(&self) -> Result<(), TrackerError> {
        self.mark_stopping();
        // Registrations check the status under the table lock, so once the lock has been
        // taken here no new hello can be spawned.
        drop(self.table.lock().await);
        self.hellos.close();
        self.hellos.wait().await;

        let result = self.table.lock().await.with_history(HistoryLog::flush).await;
        self.set_status(ShardStatus::Stopped);
        result
    }

    fn set_status(&self, status: ShardStatus) {
        let previous = self.status.send_replace(status);
        if previous != status {
            info!(tracker_id = self.settings.tracker_id, "shard {} -> {}", previous, status);
        }
    }

    fn ensure_serving(&self) -> Result<(), TrackerError> {
        match self.status() {
            ShardStatus::Serving => Ok(()),
            status => Err(TrackerError::NotServing(status)),
        }
    }

    /// Records (or replaces) a generator's metadata and greets it in the background.
    pub async fn register_generator(
        &self,
        request: RegisterGeneratorRequest,
    ) -> Result<(), TrackerError> {
        self.ensure_serving()?;
        ensure_finite("capacity", request.capacity)?;

        let record = GeneratorRecord::from(request);
        if !self.settings.range.contains(i64::from(record.identity)) {
            warn!(
                identity = record.identity,
                range = %self.settings.range,
                "registered generator falls outside this shard's range"
            );
        }

        let hello = TrackerHello {
            tracker_address: self.settings.advertised_address.clone(),
            tracker_id: self.settings.tracker_id,
            generator_id: record.identity,
            kind: record.kind,
            capacity: record.capacity,
        };
        let address = record.address.clone();

        let count = {
            let mut table = self.table.lock().await;
            // Recheck under the lock: drain may have started while we waited for it.
            self.ensure_serving()?;
            if table.records.insert(record.identity, record).is_some() {
                debug!(identity = hello.generator_id, "replaced existing registration");
            }
            self.send_hello(address, hello.clone());
            table.records.len()
        };

        metrics::counter!("grid_tracker_registrations_total").increment(1);
        metrics::gauge!("grid_tracker_generators").set(count as f64);
        info!(
            identity = hello.generator_id,
            kind = %hello.kind,
            capacity = hello.capacity,
            "registered generator"
        );
        Ok(())
    }

    fn send_hello(&self, address: String, hello: TrackerHello) {
        let client = self.generators.clone();
        let delay = self.settings.hello_delay;

        self.hellos.spawn(async move {
            // The generator's callback server may still be starting.
            tokio::time::sleep(delay).await;

            let identity = hello.generator_id;
            match client.receive_hello(&address, hello).await {
                Ok(()) => debug!(identity, %address, "hello delivered"),
                Err(e) => {
                    metrics::counter!("grid_tracker_hello_failures_total").increment(1);
                    warn!(identity, %address, "failed to deliver hello: {}", e);
                }
            }
        });
    }

    /// Stores the reported state, appends it to the history log and rebalances the shard.
    ///
    /// Updates are applied in arrival order; an older timestamp still replaces a newer one.
    pub async fn update_generator_state(
        &self,
        update: StateUpdate,
    ) -> Result<BalanceReport, TrackerError> {
        self.ensure_serving()?;
        ensure_finite("output", update.output)?;
        ensure_finite("demand", update.demand)?;

        let state = GeneratorState::new(&update, OffsetDateTime::now_utc());

        let report = {
            let mut table = self.table.lock().await;
            if !table.records.contains_key(&update.identity) {
                debug!(identity = update.identity, "state update from unregistered generator");
            }

            let row = state.clone();
            let appended = table.with_history(move |history| history.append(&row)).await;
            if let Err(e) = appended {
                error!(identity = update.identity, "failed to append history row: {}", e);
            }
            table.states.insert(update.identity, state);

            balance(
                table.states.values(),
                update.identity,
                &self.settings.balance,
            )
            .ok_or(TrackerError::MissingState(update.identity))?
        };

        metrics::counter!("grid_tracker_state_updates_total").increment(1);
        metrics::counter!(
            "grid_tracker_balance_outcomes_total",
            "outcome" => report.outcome.as_str()
        )
        .increment(1);
        log_report(&report);

        Ok(report)
    }

    pub async fn record(&self, identity: GeneratorId) -> Option<GeneratorRecord> {
        self.table.lock().await.records.get(&identity).cloned()
    }

    pub async fn state(&self, identity: GeneratorId) -> Option<GeneratorState> {
        self.table.lock().await.states.get(&identity).cloned()
    }

    pub async fn generator_count(&self) -> usize {
        self.table.lock().await.records.len()
    }

    pub async fn history_rows(&self) -> u64 {
        self.table
            .lock()
            .await
            .history
            .as_ref()
            .map_or(0, HistoryLog::rows_written)
    }
}

fn ensure_finite(name: &'static str, value: f64) -> Result<(), TrackerError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(TrackerError::InvalidFigure(name, value))
    }
}

fn log_report(report: &BalanceReport) {
    info!(
        reporter = report.reporter,
        outcome = %report.outcome,
        surplus = report.surplus_count,
        deficit = report.deficit_count,
        total_output = report.total_output,
        total_demand = report.total_demand,
        spare_capacity = report.spare_capacity,
        shiftable_capacity = report.shiftable_capacity,
        safe_load = report.safe_load,
        unsafe_load = report.unsafe_load,
        homes_to_shift = report.homes_to_shift,
        shifted = report.shifted,
        previous_demand = report.previous_demand,
        new_demand = report.new_demand,
        "balanced load"
    );
}
