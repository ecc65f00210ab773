//! Request and response bodies exchanged between the bootstrap service, tracker shards and
//! generator agents.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::{ConsumerId, GeneratorId};

/// Generation technology of a generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GeneratorKind {
    Nuclear,
    PetroleumFired,
    Hydroelectric,
    NaturalGasFired,
    LandBasedWind,
    OffshoreWind,
    UtilityScaleSolar,
    DistributedSolar,
}

impl GeneratorKind {
    pub const ALL: [GeneratorKind; 8] = [
        GeneratorKind::Nuclear,
        GeneratorKind::PetroleumFired,
        GeneratorKind::Hydroelectric,
        GeneratorKind::NaturalGasFired,
        GeneratorKind::LandBasedWind,
        GeneratorKind::OffshoreWind,
        GeneratorKind::UtilityScaleSolar,
        GeneratorKind::DistributedSolar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GeneratorKind::Nuclear => "nuclear",
            GeneratorKind::PetroleumFired => "petroleum-fired",
            GeneratorKind::Hydroelectric => "hydroelectric",
            GeneratorKind::NaturalGasFired => "natural-gas-fired",
            GeneratorKind::LandBasedWind => "land-based-wind",
            GeneratorKind::OffshoreWind => "offshore-wind",
            GeneratorKind::UtilityScaleSolar => "utility-scale-solar",
            GeneratorKind::DistributedSolar => "distributed-solar",
        }
    }
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("{0} is not a known generator kind")]
pub struct UnknownGeneratorKind(pub String);

impl FromStr for GeneratorKind {
    type Err = UnknownGeneratorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '_'], "-");
        GeneratorKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| UnknownGeneratorKind(s.to_owned()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorJoinRequest {
    pub address: String,
    pub kind: GeneratorKind,
    /// Rated capacity in MW.
    pub capacity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorJoinResponse {
    pub identity: GeneratorId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerJoinRequest {
    pub address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerJoinResponse {
    #[serde(with = "i128_string")]
    pub identity: ConsumerId,
}

/// Registration forwarded by the bootstrap service to the shard owning `identity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterGeneratorRequest {
    pub identity: GeneratorId,
    pub address: String,
    pub kind: GeneratorKind,
    pub capacity: f64,
}

/// Handshake a tracker shard pushes to a generator once it has registered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerHello {
    pub tracker_address: String,
    pub tracker_id: usize,
    pub generator_id: GeneratorId,
    pub kind: GeneratorKind,
    pub capacity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    pub identity: GeneratorId,
    /// Logical timestamp of the report, incremented by the generator on every mutation.
    pub timestamp: u64,
    /// Current simulated production in MW.
    pub output: f64,
    /// Load currently assigned to the generator in MW.
    pub demand: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DemandUpdate {
    pub demand: f64,
}

/// Body of the RPCs that return nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

mod i128_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &i128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i128, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_parses_loose_spellings() {
        assert_eq!(
            "land-based wind".parse::<GeneratorKind>().unwrap(),
            GeneratorKind::LandBasedWind
        );
        assert_eq!(
            "Utility_Scale_Solar".parse::<GeneratorKind>().unwrap(),
            GeneratorKind::UtilityScaleSolar
        );
        let err = "coal".parse::<GeneratorKind>().unwrap_err();
        assert_eq!(err, UnknownGeneratorKind("coal".to_owned()));
        assert_eq!(err.to_string(), "coal is not a known generator kind");
    }

    #[test]
    fn kind_uses_kebab_case_on_the_wire() {
        let request = GeneratorJoinRequest {
            address: "127.0.0.1:33001".to_owned(),
            kind: GeneratorKind::OffshoreWind,
            capacity: 120.5,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"address": "127.0.0.1:33001", "kind": "offshore-wind", "capacity": 120.5})
        );
    }

    #[test]
    fn consumer_identity_travels_as_a_string() {
        let response = ConsumerJoinResponse {
            identity: i128::MIN + 1,
        };
        let encoded = serde_json::to_value(response).unwrap();
        assert_eq!(
            encoded,
            json!({"identity": "-170141183460469231731687303715884105727"})
        );

        let decoded: ConsumerJoinResponse = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn empty_is_an_empty_object() {
        assert_eq!(serde_json::to_string(&Empty {}).unwrap(), "{}");
    }
}
