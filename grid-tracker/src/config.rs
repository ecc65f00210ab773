use std::path::PathBuf;

use envconfig::Envconfig;
use grid_common::config::EnvMsDuration;
use grid_common::ring::{BucketRange, HashRing, RingError};
use thiserror::Error;

use crate::balancer::BalanceParams;
use crate::shard::ShardSettings;

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "32000")]
    pub port: u16,

    #[envconfig(default = "0")]
    pub tracker_id: usize,

    #[envconfig(default = "0")]
    pub host_id: u32,

    #[envconfig(default = "1")]
    pub num_shards: usize,

    #[envconfig(default = "32")]
    pub hash_width: u32,

    /// Address sent to generators in hellos. Defaults to `localhost:<port>`.
    pub advertised_address: Option<String>,

    pub history_path: Option<PathBuf>,

    #[envconfig(default = "0.1")]
    pub safety_threshold: f64,

    #[envconfig(default = "0.00131")]
    pub unit_size: f64,

    #[envconfig(default = "200")]
    pub hello_delay: EnvMsDuration,

    #[envconfig(default = "5000")]
    pub request_timeout: EnvMsDuration,

    #[envconfig(default = "1024")]
    pub max_concurrent_requests: usize,

    #[envconfig(default = "false")]
    pub export_prometheus: bool,
}

#[derive(Error, Debug, PartialEq)]
pub enum SettingsError {
    #[error(transparent)]
    Ring(#[from] RingError),
    #[error("tracker id {tracker_id} is out of range for {num_shards} shards")]
    TrackerIdOutOfRange { tracker_id: usize, num_shards: usize },
    #[error("safety threshold must be in [0, 1), got {0}")]
    InvalidSafetyThreshold(f64),
    #[error("unit size must be a positive number of MW, got {0}")]
    InvalidUnitSize(f64),
}

impl Config {
    /// Produce a host:port address for binding a TcpListener.
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn advertised_address(&self) -> String {
        self.advertised_address
            .clone()
            .unwrap_or_else(|| format!("localhost:{}", self.port))
    }

    /// The slice of the identity space this tracker owns.
    pub fn range(&self) -> Result<BucketRange, SettingsError> {
        let ring = HashRing::for_generators(self.num_shards, self.hash_width)?;
        ring.range(self.tracker_id)
            .ok_or(SettingsError::TrackerIdOutOfRange {
                tracker_id: self.tracker_id,
                num_shards: self.num_shards,
            })
    }

    pub fn balance_params(&self) -> Result<BalanceParams, SettingsError> {
        if !(0.0..1.0).contains(&self.safety_threshold) {
            return Err(SettingsError::InvalidSafetyThreshold(self.safety_threshold));
        }
        if !(self.unit_size.is_finite() && self.unit_size > 0.0) {
            return Err(SettingsError::InvalidUnitSize(self.unit_size));
        }

        Ok(BalanceParams {
            safety_threshold: self.safety_threshold,
            unit_size: self.unit_size,
        })
    }

    pub fn shard_settings(&self) -> Result<ShardSettings, SettingsError> {
        Ok(ShardSettings {
            tracker_id: self.tracker_id,
            host_id: self.host_id,
            advertised_address: self.advertised_address(),
            range: self.range()?,
            balance: self.balance_params()?,
            hello_delay: self.hello_delay.0,
        })
    }
}
