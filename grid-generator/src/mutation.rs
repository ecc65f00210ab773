//! Simulated output of a generator.
//!
//! A generator's output follows a capacity factor sampled once per mutation. With a coefficient
//! table, each period (a row of the table, usually a month) carries a normal distribution per
//! generator kind; the period in force is `timestamp mod periods`. Samples are smoothed over a
//! short moving window before being applied to the rated capacity.
use std::collections::VecDeque;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use grid_common::rpc::GeneratorKind;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use thiserror::Error;
use tracing::debug;

/// Capacity factor used when no distribution is known for the current period.
pub const DEFAULT_COEFFICIENT: f64 = 0.9;

/// Number of samples averaged into the current output.
pub const WINDOW_SIZE: usize = 5;

#[derive(Error, Debug)]
pub enum MutationError {
    #[error("failed to open output config {path}: {error}")]
    Open { path: PathBuf, error: io::Error },
    #[error("failed to read output config: {0}")]
    Read(#[from] csv::Error),
    #[error("output config has no column for {0}")]
    MissingKind(GeneratorKind),
}

/// Source of capacity factors, one per logical timestamp.
pub trait OutputModel: Send {
    /// A non-negative capacity factor for the period containing `timestamp`.
    fn coefficient(&mut self, timestamp: u64) -> f64;
}

/// Always yields the same capacity factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedOutput(pub f64);

impl Default for FixedOutput {
    fn default() -> Self {
        Self(DEFAULT_COEFFICIENT)
    }
}

impl OutputModel for FixedOutput {
    fn coefficient(&mut self, _timestamp: u64) -> f64 {
        self.0
    }
}

/// Samples a normal distribution per period, clamping negative draws to zero.
pub struct StochasticOutput {
    schedule: Vec<Option<Normal<f64>>>,
    rng: StdRng,
}

impl StochasticOutput {
    pub fn new(schedule: Vec<Option<Normal<f64>>>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { schedule, rng }
    }
}

impl OutputModel for StochasticOutput {
    fn coefficient(&mut self, timestamp: u64) -> f64 {
        if self.schedule.is_empty() {
            return DEFAULT_COEFFICIENT;
        }

        let period = (timestamp % self.schedule.len() as u64) as usize;
        match &self.schedule[period] {
            Some(normal) => normal.sample(&mut self.rng).max(0.0),
            None => DEFAULT_COEFFICIENT,
        }
    }
}

/// Per-period output distributions for every generator kind, read from CSV.
///
/// The first column labels the period. Every other column is headed by a generator kind and
/// holds cells of the form `"(mu, sigma)"`; any other cell means no distribution is known.
#[derive(Debug, Clone)]
pub struct CoefficientTable {
    periods: Vec<String>,
    columns: Vec<(GeneratorKind, Vec<Option<Normal<f64>>>)>,
}

impl CoefficientTable {
    pub fn from_path(path: &Path) -> Result<Self, MutationError> {
        let file = File::open(path).map_err(|error| MutationError::Open {
            path: path.to_owned(),
            error,
        })?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, MutationError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let kinds: Vec<Option<GeneratorKind>> = reader
            .headers()?
            .iter()
            .skip(1)
            .map(|header| {
                let kind = header.parse().ok();
                if kind.is_none() {
                    debug!("ignoring output config column {:?}", header);
                }
                kind
            })
            .collect();

        let mut periods = Vec::new();
        let mut cells: Vec<Vec<Option<Normal<f64>>>> = vec![Vec::new(); kinds.len()];
        for record in reader.records() {
            let record = record?;
            let mut fields = record.iter();
            periods.push(fields.next().unwrap_or_default().to_owned());
            for (column, cell) in cells.iter_mut().zip(fields) {
                column.push(parse_cell(cell));
            }
        }

        let columns = kinds
            .into_iter()
            .zip(cells)
            .filter_map(|(kind, column)| kind.map(|kind| (kind, column)))
            .collect();

        Ok(Self { periods, columns })
    }

    pub fn periods(&self) -> &[String] {
        &self.periods
    }

    pub fn schedule(&self, kind: GeneratorKind) -> Option<&[Option<Normal<f64>>]> {
        self.columns
            .iter()
            .find(|(column, _)| *column == kind)
            .map(|(_, schedule)| schedule.as_slice())
    }
}

fn parse_cell(cell: &str) -> Option<Normal<f64>> {
    let inner = cell.trim().strip_prefix('(')?.strip_suffix(')')?;
    let (mu, sigma) = inner.split_once(',')?;
    let mu: f64 = mu.trim().parse().ok()?;
    let sigma: f64 = sigma.trim().parse().ok()?;
    if !mu.is_finite() {
        return None;
    }
    Normal::new(mu, sigma).ok()
}

/// Builds the output model for `kind`: stochastic when a coefficient table is configured,
/// fixed at [`DEFAULT_COEFFICIENT`] otherwise.
pub fn load_model(
    path: Option<&Path>,
    kind: GeneratorKind,
    seed: Option<u64>,
) -> Result<Box<dyn OutputModel>, MutationError> {
    let Some(path) = path else {
        return Ok(Box::new(FixedOutput::default()));
    };

    let table = CoefficientTable::from_path(path)?;
    let schedule = table
        .schedule(kind)
        .ok_or(MutationError::MissingKind(kind))?
        .to_vec();
    debug!(
        periods = table.periods().len(),
        "loaded output coefficients for {}", kind
    );
    Ok(Box::new(StochasticOutput::new(schedule, seed)))
}

/// Moves a generator's output forward one logical step at a time.
pub struct OutputMutator {
    capacity: f64,
    model: Box<dyn OutputModel>,
    window: VecDeque<f64>,
    timestamp: u64,
    output: f64,
}

impl OutputMutator {
    /// Starts at full rated capacity and logical time zero.
    pub fn new(capacity: f64, model: Box<dyn OutputModel>) -> Self {
        Self {
            capacity,
            model,
            window: VecDeque::with_capacity(WINDOW_SIZE),
            timestamp: 0,
            output: capacity,
        }
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn output(&self) -> f64 {
        self.output
    }

    /// Samples the next capacity factor and returns the new `(timestamp, output)`.
    pub fn mutate(&mut self) -> (u64, f64) {
        let coefficient = self.model.coefficient(self.timestamp);
        if self.window.len() == WINDOW_SIZE {
            self.window.pop_front();
        }
        self.window.push_back(coefficient);

        let mean = self.window.iter().sum::<f64>() / self.window.len() as f64;
        self.output = self.capacity * mean;
        self.timestamp += 1;

        (self.timestamp, self.output)
    }
}
