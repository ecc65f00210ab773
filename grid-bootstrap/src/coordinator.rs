use std::sync::Arc;

use grid_common::client::TrackerClient;
use grid_common::config::TrackerDirectory;
use grid_common::identity::{ConsumerId, GeneratorId, IdentityIssuer};
use grid_common::ring::HashRing;
use grid_common::rpc::{ConsumerJoinRequest, GeneratorJoinRequest, RegisterGeneratorRequest};
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::audit::{AuditEntry, AuditSink, PeerKind};
use crate::error::BootstrapError;

/// Issues identities and routes every joining generator to the tracker shard that owns it.
pub struct BootstrapCoordinator {
    issuer: IdentityIssuer,
    ring: HashRing,
    directory: TrackerDirectory,
    trackers: Arc<dyn TrackerClient>,
    audit: Arc<dyn AuditSink>,
    forwards: TaskTracker,
}

impl BootstrapCoordinator {
    pub fn new(
        issuer: IdentityIssuer,
        ring: HashRing,
        directory: TrackerDirectory,
        trackers: Arc<dyn TrackerClient>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, BootstrapError> {
        if ring.num_buckets() != directory.len() {
            return Err(BootstrapError::DirectoryMismatch {
                shards: ring.num_buckets(),
                trackers: directory.len(),
            });
        }

        Ok(Self {
            issuer,
            ring,
            directory,
            trackers,
            audit,
            forwards: TaskTracker::new(),
        })
    }

    pub fn ring(&self) -> &HashRing {
        &self.ring
    }

    /// Shard index and tracker address owning `identity`.
    pub fn owner_of(&self, identity: GeneratorId) -> Result<(usize, &str), BootstrapError> {
        let shard = self.ring.assign(i64::from(identity))?;
        let tracker = self
            .directory
            .get(shard)
            .ok_or(BootstrapError::MissingTracker(shard))?;
        Ok((shard, tracker))
    }

    /// Issues the generator's identity and forwards its registration to the owning shard.
    ///
    /// The forward runs in the background: a tracker that cannot be reached is logged and
    /// counted but does not fail the join.
    pub async fn generator_join(
        &self,
        request: GeneratorJoinRequest,
    ) -> Result<GeneratorId, BootstrapError> {
        if request.address.trim().is_empty() {
            return Err(BootstrapError::MissingAddress);
        }
        if !request.capacity.is_finite() || request.capacity < 0.0 {
            return Err(BootstrapError::InvalidCapacity(request.capacity));
        }

        let identity = self.issuer.generator_id(&request.address)?;
        let (shard, tracker) = self.owner_of(identity)?;
        let tracker = tracker.to_owned();

        self.audit(AuditEntry::now(PeerKind::Generator, &request.address, identity))
            .await;
        metrics::counter!("grid_bootstrap_joins_total", "kind" => PeerKind::Generator.as_str())
            .increment(1);
        info!(
            identity,
            shard,
            %tracker,
            address = %request.address,
            kind = %request.kind,
            "generator joined"
        );

        let registration = RegisterGeneratorRequest {
            identity,
            address: request.address,
            kind: request.kind,
            capacity: request.capacity,
        };
        let trackers = self.trackers.clone();
        self.forwards.spawn(async move {
            if let Err(e) = trackers.register_generator(&tracker, registration).await {
                metrics::counter!("grid_bootstrap_forward_failures_total").increment(1);
                warn!(identity, shard, %tracker, "failed to forward registration: {}", e);
            }
        });

        Ok(identity)
    }

    /// Issues a consumer identity. Consumers are not assigned to a shard.
    pub async fn consumer_join(
        &self,
        request: ConsumerJoinRequest,
    ) -> Result<ConsumerId, BootstrapError> {
        if request.address.trim().is_empty() {
            return Err(BootstrapError::MissingAddress);
        }

        let identity = self.issuer.consumer_id(&request.address)?;

        self.audit(AuditEntry::now(PeerKind::Consumer, &request.address, identity))
            .await;
        metrics::counter!("grid_bootstrap_joins_total", "kind" => PeerKind::Consumer.as_str())
            .increment(1);
        info!(%identity, address = %request.address, "consumer joined");

        Ok(identity)
    }

    async fn audit(&self, entry: AuditEntry) {
        if let Err(e) = self.audit.record(entry).await {
            error!("failed to write audit entry: {}", e);
        }
    }

    /// Waits for every registration forward still in flight.
    pub async fn drain(&self) {
        self.forwards.close();
        self.forwards.wait().await;
    }
}
