use std::path::PathBuf;

use envconfig::Envconfig;
use grid_common::config::EnvMsDuration;
use grid_common::rpc::GeneratorKind;
use thiserror::Error;

use crate::agent::AgentSettings;

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "33001")]
    pub port: u16,

    /// Callback address given to the bootstrap service. Defaults to `localhost:<port>`.
    pub advertised_address: Option<String>,

    #[envconfig(default = "localhost:50051")]
    pub bootstrap_address: String,

    #[envconfig(default = "nuclear")]
    pub kind: GeneratorKind,

    /// Rated capacity in MW.
    #[envconfig(default = "100")]
    pub capacity: f64,

    #[envconfig(default = "0")]
    pub simulated_rtt: EnvMsDuration,

    #[envconfig(default = "2000")]
    pub refresh_interval: EnvMsDuration,

    #[envconfig(default = "0.75")]
    pub initial_demand_ratio: f64,

    pub output_config_path: Option<PathBuf>,

    pub mutation_seed: Option<u64>,

    #[envconfig(default = "30000")]
    pub hello_timeout: EnvMsDuration,

    #[envconfig(default = "5000")]
    pub request_timeout: EnvMsDuration,

    #[envconfig(default = "64")]
    pub max_concurrent_requests: usize,

    #[envconfig(default = "false")]
    pub export_prometheus: bool,
}

#[derive(Error, Debug, PartialEq)]
pub enum SettingsError {
    #[error("capacity must be a positive number of MW, got {0}")]
    InvalidCapacity(f64),
    #[error("initial demand ratio must be in [0, 1], got {0}")]
    InvalidDemandRatio(f64),
    #[error("refresh interval must not be zero")]
    ZeroRefreshInterval,
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

    pub fn agent_settings(&self) -> Result<AgentSettings, SettingsError> {
        if !(self.capacity.is_finite() && self.capacity > 0.0) {
            return Err(SettingsError::InvalidCapacity(self.capacity));
        }
        if !(0.0..=1.0).contains(&self.initial_demand_ratio) {
            return Err(SettingsError::InvalidDemandRatio(self.initial_demand_ratio));
        }
        if self.refresh_interval.0.is_zero() {
            return Err(SettingsError::ZeroRefreshInterval);
        }

        Ok(AgentSettings {
            advertised_address: self.advertised_address(),
            bootstrap_address: self.bootstrap_address.clone(),
            kind: self.kind,
            capacity: self.capacity,
            initial_demand_ratio: self.initial_demand_ratio,
            simulated_rtt: self.simulated_rtt.0,
            refresh_interval: self.refresh_interval.0,
            hello_timeout: self.hello_timeout.0,
        })
    }
}
