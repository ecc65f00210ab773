use std::fmt;
use std::str::FromStr;
use std::time;

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not a duration in milliseconds")]
    InvalidDuration(String),
    #[error("tracker directory must list at least one address")]
    EmptyTrackerDirectory,
    #[error("tracker directory entry {0} is blank")]
    BlankTrackerAddress(usize),
}

/// Duration read from the environment as a whole number of milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvMsDuration(pub time::Duration);

impl FromStr for EnvMsDuration {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidDuration(s.to_owned()))?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}

impl From<EnvMsDuration> for time::Duration {
    fn from(value: EnvMsDuration) -> Self {
        value.0
    }
}

/// Ordered list of tracker shard addresses. Position `i` holds the address of shard `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerDirectory(Vec<String>);

impl TrackerDirectory {
    pub fn new(addresses: Vec<String>) -> Result<Self, ConfigError> {
        if addresses.is_empty() {
            return Err(ConfigError::EmptyTrackerDirectory);
        }
        if let Some(position) = addresses.iter().position(|a| a.trim().is_empty()) {
            return Err(ConfigError::BlankTrackerAddress(position));
        }
        Ok(Self(addresses))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, shard: usize) -> Option<&str> {
        self.0.get(shard).map(String::as_str)
    }

    pub fn addresses(&self) -> &[String] {
        &self.0
    }
}

impl FromStr for TrackerDirectory {
    type Err = ConfigError;

    /// Parses a comma separated list, e.g. `127.0.0.1:32000,127.0.0.1:32001`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ConfigError::EmptyTrackerDirectory);
        }
        TrackerDirectory::new(s.split(',').map(|a| a.trim().to_owned()).collect())
    }
}

impl fmt::Display for TrackerDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}
