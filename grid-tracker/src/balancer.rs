//! Redistribution of demand between the generators a shard tracks.
//!
//! Generators whose safety ratio is above the threshold form the surplus set and absorb load;
//! generators below it form the deficit set and shed it. Every shift is a whole number of
//! residential units.
use std::fmt;

use grid_common::identity::GeneratorId;

use crate::state::GeneratorState;

/// Fraction of output every generator should keep free.
pub const DEFAULT_SAFETY_THRESHOLD: f64 = 0.1;

/// One residential home, in MW.
pub const DEFAULT_UNIT_SIZE: f64 = 0.00131;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceParams {
    pub safety_threshold: f64,
    pub unit_size: f64,
}

impl Default for BalanceParams {
    fn default() -> Self {
        Self {
            safety_threshold: DEFAULT_SAFETY_THRESHOLD,
            unit_size: DEFAULT_UNIT_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceOutcome {
    /// No generator is below its safety margin, or the deficits net out.
    NoLoadToShift,
    /// Load was moved and the surplus set had room for all of it.
    Shifted,
    /// Load was moved but the surplus set cannot safely absorb all of it.
    Shortfall,
    /// A proportional share could not be computed.
    Degenerate,
}

impl BalanceOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            BalanceOutcome::NoLoadToShift => "no_load_to_shift",
            BalanceOutcome::Shifted => "shifted",
            BalanceOutcome::Shortfall => "shortfall",
            BalanceOutcome::Degenerate => "degenerate",
        }
    }
}

impl fmt::Display for BalanceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Figures from a single balancing round, in MW unless noted.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceReport {
    pub reporter: GeneratorId,
    pub outcome: BalanceOutcome,
    pub surplus_count: usize,
    pub deficit_count: usize,
    pub total_output: f64,
    pub total_demand: f64,
    /// Net capacity of the surplus set minus that of the deficit set, ignoring the safety margin.
    pub spare_capacity: f64,
    /// Load the surplus set can take on while staying within its safety margin.
    pub shiftable_capacity: f64,
    pub safe_load: f64,
    /// Sum of the safe net capacity of the deficit set. Negative when load has to move.
    pub unsafe_load: f64,
    pub homes_to_shift: u64,
    pub shifted: f64,
    pub previous_demand: f64,
    pub new_demand: f64,
}

/// Computes the new demand for `reporter` from the current state of every generator in the
/// shard. Returns `None` when `reporter` has no row.
pub fn balance<'a, I>(
    rows: I,
    reporter: GeneratorId,
    params: &BalanceParams,
) -> Option<BalanceReport>
where
    I: IntoIterator<Item = &'a GeneratorState>,
{
    let threshold = params.safety_threshold;
    let unit = params.unit_size;
    let safe_demand = |row: &GeneratorState| row.output * (1.0 - threshold);
    let safe_net_capacity = |row: &GeneratorState| safe_demand(row) - row.demand;

    let rows: Vec<&GeneratorState> = rows.into_iter().collect();
    let reporter_row = rows.iter().copied().find(|row| row.identity == reporter)?;
    let previous_demand = reporter_row.demand;

    // Rows sitting exactly on the threshold belong to neither set.
    let surplus: Vec<&GeneratorState> = rows
        .iter()
        .copied()
        .filter(|row| row.safety_ratio > threshold)
        .collect();
    let deficit: Vec<&GeneratorState> = rows
        .iter()
        .copied()
        .filter(|row| row.safety_ratio < threshold)
        .collect();

    let shiftable_capacity: f64 = surplus.iter().map(|row| safe_net_capacity(row)).sum();
    let unsafe_load: f64 = deficit.iter().map(|row| safe_net_capacity(row)).sum();

    let mut report = BalanceReport {
        reporter,
        outcome: BalanceOutcome::NoLoadToShift,
        surplus_count: surplus.len(),
        deficit_count: deficit.len(),
        total_output: rows.iter().map(|row| row.output).sum(),
        total_demand: rows.iter().map(|row| row.demand).sum(),
        spare_capacity: surplus.iter().map(|row| row.net_capacity).sum::<f64>()
            - deficit.iter().map(|row| row.net_capacity).sum::<f64>(),
        shiftable_capacity,
        safe_load: rows.iter().map(|row| safe_demand(row)).sum(),
        unsafe_load,
        homes_to_shift: 0,
        shifted: 0.0,
        previous_demand,
        new_demand: previous_demand,
    };

    if unsafe_load >= 0.0 || unsafe_load.is_nan() {
        return Some(report);
    }

    report.homes_to_shift = (unsafe_load.abs() / unit).ceil() as u64;

    if surplus.is_empty() || shiftable_capacity == 0.0 || !shiftable_capacity.is_finite() {
        report.outcome = BalanceOutcome::Degenerate;
        return Some(report);
    }

    // Surplus rows take on load in proportion to their safe net capacity, rounded to whole units.
    let absorbed: Vec<(GeneratorId, f64)> = surplus
        .iter()
        .map(|row| {
            let share = safe_net_capacity(row) / shiftable_capacity;
            let load = -((share * unsafe_load) / unit).round() * unit;
            (row.identity, load)
        })
        .collect();
    let total_absorbed: f64 = absorbed.iter().map(|(_, load)| load).sum();

    // Deficit rows give up what the surplus took on, split by their own share.
    let new_load = if let Some((_, load)) = absorbed.iter().find(|(id, _)| *id == reporter) {
        *load
    } else if deficit.iter().any(|row| row.identity == reporter) {
        -total_absorbed * (safe_net_capacity(reporter_row) / unsafe_load)
    } else {
        0.0
    };

    report.shifted = total_absorbed.abs();
    report.new_demand = previous_demand + new_load;
    report.outcome = if shiftable_capacity >= unsafe_load.abs() {
        BalanceOutcome::Shifted
    } else {
        BalanceOutcome::Shortfall
    };

    Some(report)
}
