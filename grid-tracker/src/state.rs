use grid_common::identity::GeneratorId;
use grid_common::rpc::{GeneratorKind, RegisterGeneratorRequest, StateUpdate};
use time::OffsetDateTime;

/// Metadata a shard keeps for every generator registered with it.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorRecord {
    pub identity: GeneratorId,
    pub address: String,
    pub kind: GeneratorKind,
    pub capacity: f64,
}

impl From<RegisterGeneratorRequest> for GeneratorRecord {
    fn from(request: RegisterGeneratorRequest) -> Self {
        Self {
            identity: request.identity,
            address: request.address,
            kind: request.kind,
            capacity: request.capacity,
        }
    }
}

/// Latest report received from a generator, with the figures derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorState {
    pub identity: GeneratorId,
    pub timestamp: u64,
    pub output: f64,
    pub demand: f64,
    pub net_capacity: f64,
    pub safety_ratio: f64,
    pub recorded_at: OffsetDateTime,
}

impl GeneratorState {
    pub fn new(update: &StateUpdate, recorded_at: OffsetDateTime) -> Self {
        let net_capacity = update.output - update.demand;
        Self {
            identity: update.identity,
            timestamp: update.timestamp,
            output: update.output,
            demand: update.demand,
            net_capacity,
            safety_ratio: safety_ratio(update.output, net_capacity),
            recorded_at,
        }
    }
}

/// Share of `output` not claimed by demand. A generator producing nothing has no margin at all
/// and sorts below every real ratio.
pub fn safety_ratio(output: f64, net_capacity: f64) -> f64 {
    if output == 0.0 {
        f64::NEG_INFINITY
    } else {
        net_capacity / output
    }
}
