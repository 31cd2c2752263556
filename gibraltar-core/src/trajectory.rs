//! Integration output

use std::fmt;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::errors::{GibraltarError, GibraltarResult};
use crate::hypsometry::BasinHypsometry;
use crate::rates::State;

/// Why a solver halted before the requested end time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The step budget of a solver segment was exhausted
    MaxStepsReached,
    /// The step size shrank below what floating point can resolve
    StepSizeUnderflow,
    /// An explicit solver detected stiffness and no stiff fallback was allowed
    Stiffness,
    /// A rate evaluation produced NaN or infinity
    NonFinite,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::MaxStepsReached => "maximum number of steps reached",
            StopReason::StepSizeUnderflow => "step size underflow",
            StopReason::Stiffness => "problem appears stiff",
            StopReason::NonFinite => "non-finite rate encountered",
        };
        f.write_str(text)
    }
}

/// How an integration run ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    /// The requested end time was reached
    Completed,
    /// The run halted early; samples up to `time` are valid
    Stopped { time: f64, reason: StopReason },
}

/// Counters accumulated over all solver segments of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverStats {
    pub evaluations: u64,
    pub accepted_steps: u64,
    pub rejected_steps: u64,
    /// Number of switches from the explicit to the stiff solver
    pub method_switches: u32,
}

impl SolverStats {
    pub(crate) fn absorb(&mut self, other: SolverStats) {
        self.evaluations += other.evaluations;
        self.accepted_steps += other.accepted_steps;
        self.rejected_steps += other.rejected_steps;
        self.method_switches += other.method_switches;
    }
}

/// Sampled solution of one integration run.
///
/// Times are in seconds and levels in metres. All four series have the same
/// length; the first time is the start of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub time: Array1<f64>,
    pub sill_level: Array1<f64>,
    pub basin_level: Array1<f64>,
    /// Derived from `basin_level` through the compensated ocean level
    pub ocean_level: Array1<f64>,
    pub outcome: Outcome,
    pub stats: SolverStats,
}

impl Trajectory {
    pub(crate) fn from_samples(
        times: Vec<f64>,
        states: Vec<State>,
        hypsometry: &BasinHypsometry,
        outcome: Outcome,
        stats: SolverStats,
    ) -> Self {
        debug_assert_eq!(times.len(), states.len());
        let sill_level: Array1<f64> = states.iter().map(|y| y[0]).collect();
        let basin_level: Array1<f64> = states.iter().map(|y| y[1]).collect();
        let ocean_level = basin_level.mapv(|z| hypsometry.compensated_ocean_level(z));
        Self {
            time: Array1::from(times),
            sill_level,
            basin_level,
            ocean_level,
            outcome,
            stats,
        }
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Whether the run reached the requested end time.
    pub fn reached_end(&self) -> bool {
        matches!(self.outcome, Outcome::Completed)
    }

    /// Time of the last sample.
    /// unit: s
    pub fn end_time(&self) -> Option<f64> {
        self.time.last().copied()
    }

    /// `[sill level, basin level]` at the last sample.
    pub fn final_state(&self) -> Option<State> {
        let n = self.len();
        if n == 0 {
            return None;
        }
        Some(State::new(self.sill_level[n - 1], self.basin_level[n - 1]))
    }

    /// Converts an early stop into an error, keeping complete runs.
    pub fn into_result(self) -> GibraltarResult<Self> {
        match self.outcome {
            Outcome::Completed => Ok(self),
            Outcome::Stopped { time, reason } => {
                Err(GibraltarError::IntegrationStopped { time, reason })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(outcome: Outcome) -> Trajectory {
        Trajectory::from_samples(
            vec![0.0, 1.0, 2.0],
            vec![
                State::new(-60.0, 0.0),
                State::new(-59.0, -10.0),
                State::new(-58.0, -20.0),
            ],
            &BasinHypsometry::default(),
            outcome,
            SolverStats::default(),
        )
    }

    #[test]
    fn test_series_lengths_match() {
        let t = sample(Outcome::Completed);
        assert_eq!(t.len(), 3);
        assert_eq!(t.sill_level.len(), 3);
        assert_eq!(t.basin_level.len(), 3);
        assert_eq!(t.ocean_level.len(), 3);
        assert_eq!(t.ocean_level[0], 0.0);
        assert!(t.ocean_level[2] > 0.0);
        assert_eq!(t.final_state(), Some(State::new(-58.0, -20.0)));
    }

    #[test]
    fn test_stopped_run_becomes_error() {
        let t = sample(Outcome::Stopped {
            time: 2.0,
            reason: StopReason::NonFinite,
        });
        assert!(!t.reached_end());
        match t.into_result() {
            Err(GibraltarError::IntegrationStopped { time, reason }) => {
                assert_eq!(time, 2.0);
                assert_eq!(reason, StopReason::NonFinite);
            }
            other => panic!("Expected IntegrationStopped, got {:?}", other),
        }
    }

    #[test]
    fn test_serializes_to_json() {
        let t = sample(Outcome::Completed);
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains("\"Completed\""));
        let back: Trajectory = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 3);
        assert_eq!(back.time, t.time);
    }
}
