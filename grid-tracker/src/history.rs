use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use grid_common::identity::GeneratorId;
use serde::Serialize;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;

use crate::state::GeneratorState;

pub const HEADER: [&str; 9] = [
    "identity",
    "timestamp",
    "host_id",
    "shard_id",
    "output",
    "demand",
    "net_capacity",
    "safety_ratio",
    "wall_clock_time",
];

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("failed to open history log {path}: {error}")]
    Open { path: PathBuf, error: io::Error },
    #[error("failed to write history row: {0}")]
    Write(#[from] csv::Error),
    #[error("failed to flush history log: {0}")]
    Flush(#[from] io::Error),
    #[error("failed to format wall clock time: {0}")]
    Timestamp(#[from] time::error::Format),
}

#[derive(Serialize)]
struct HistoryRow {
    identity: GeneratorId,
    timestamp: u64,
    host_id: u32,
    shard_id: usize,
    output: f64,
    demand: f64,
    net_capacity: f64,
    safety_ratio: f64,
    wall_clock_time: String,
}

/// Append-only CSV log of every state update a shard accepts.
///
/// Each row is flushed before `append` returns, so a row is either fully written or absent.
pub struct HistoryLog {
    writer: csv::Writer<Box<dyn Write + Send>>,
    host_id: u32,
    shard_id: usize,
    rows: u64,
}

impl HistoryLog {
    /// Starts a new log at `path`, replacing whatever was there.
    pub fn create(path: &Path, host_id: u32, shard_id: usize) -> Result<Self, HistoryError> {
        let file = File::create(path).map_err(|error| HistoryError::Open {
            path: path.to_owned(),
            error,
        })?;
        Self::from_writer(file, host_id, shard_id)
    }

    pub fn from_writer<W>(writer: W, host_id: u32, shard_id: usize) -> Result<Self, HistoryError>
    where
        W: Write + Send + 'static,
    {
        let boxed: Box<dyn Write + Send> = Box::new(writer);
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(boxed);
        writer.write_record(HEADER)?;
        writer.flush()?;

        Ok(Self {
            writer,
            host_id,
            shard_id,
            rows: 0,
        })
    }

    /// A log that discards every row.
    pub fn discard(host_id: u32, shard_id: usize) -> Self {
        let boxed: Box<dyn Write + Send> = Box::new(io::sink());
        Self {
            writer: csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(boxed),
            host_id,
            shard_id,
            rows: 0,
        }
    }

    pub fn append(&mut self, state: &GeneratorState) -> Result<(), HistoryError> {
        let row = HistoryRow {
            identity: state.identity,
            timestamp: state.timestamp,
            host_id: self.host_id,
            shard_id: self.shard_id,
            output: state.output,
            demand: state.demand,
            net_capacity: state.net_capacity,
            safety_ratio: state.safety_ratio,
            wall_clock_time: state.recorded_at.format(&Rfc3339)?,
        };

        self.writer.serialize(row)?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), HistoryError> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn rows_written(&self) -> u64 {
        self.rows
    }
}
