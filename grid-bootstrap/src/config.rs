use std::path::PathBuf;

use envconfig::Envconfig;
use grid_common::config::{EnvMsDuration, TrackerDirectory};
use grid_common::ring::{HashRing, RingError};

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "50051")]
    pub port: u16,

    #[envconfig(default = "42")]
    pub hash_seed: u32,

    #[envconfig(default = "32")]
    pub hash_width: u32,

    /// Tracker addresses in shard order, comma separated.
    #[envconfig(default = "localhost:32000")]
    pub tracker_directory: TrackerDirectory,

    #[envconfig(default = "5000")]
    pub request_timeout: EnvMsDuration,

    pub audit_log_path: Option<PathBuf>,

    #[envconfig(default = "1024")]
    pub max_concurrent_requests: usize,

    #[envconfig(default = "false")]
    pub export_prometheus: bool,
}

impl Config {
    /// Produce a host:port address for binding a TcpListener.
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn num_shards(&self) -> usize {
        self.tracker_directory.len()
    }

    /// One bucket per directory entry over the generator identity space.
    pub fn ring(&self) -> Result<HashRing, RingError> {
        HashRing::for_generators(self.num_shards(), self.hash_width)
    }
}
