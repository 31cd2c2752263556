//! Trajectory integrator
//!
//! Integration time is given in kiloyears for convenience and converted to
//! seconds once, here. Every other quantity, in and out, is SI: levels in
//! metres and times in seconds. Mixing the two silently produces a run a
//! thousand times too long or too short.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{GibraltarError, GibraltarResult};
use crate::ivp::{solve_segment, Method, SolverSettings};
use crate::model::SillBasinModel;
use crate::parameters::Parameters;
use crate::rates::State;
use crate::trajectory::{Outcome, Trajectory};
use crate::units::kyr_to_seconds;

/// Options for one integration run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationOptions {
    /// Duration of the run
    /// unit: kyr
    pub integration_time_kyr: f64,
    /// Initial sill level
    /// unit: m
    pub sill_level0: f64,
    /// Initial basin level
    /// unit: m
    pub basin_level0: f64,
    /// Absolute and relative error tolerance of the solver
    pub tolerance: f64,
    pub method: Method,
    /// Step budget of each solver segment
    pub max_steps: usize,
}

impl Default for IntegrationOptions {
    fn default() -> Self {
        Self {
            integration_time_kyr: 100.0,
            sill_level0: -60.0,
            basin_level0: 0.0,
            tolerance: 1e-7,
            method: Method::Auto,
            max_steps: 100_000,
        }
    }
}

impl IntegrationOptions {
    pub(crate) fn solver_settings(&self) -> SolverSettings {
        SolverSettings {
            method: self.method,
            tolerance: self.tolerance,
            max_steps: self.max_steps,
        }
    }

    fn validate(&self) -> GibraltarResult<()> {
        validate_settings(&self.solver_settings())?;
        if !self.integration_time_kyr.is_finite() || self.integration_time_kyr < 0.0 {
            return Err(GibraltarError::InvalidOptions(format!(
                "integration time must be finite and non-negative, got {} kyr",
                self.integration_time_kyr
            )));
        }
        validate_state(&State::new(self.sill_level0, self.basin_level0))
    }
}

pub(crate) fn validate_settings(settings: &SolverSettings) -> GibraltarResult<()> {
    if !settings.tolerance.is_finite() || settings.tolerance <= 0.0 {
        return Err(GibraltarError::InvalidOptions(format!(
            "tolerance must be finite and positive, got {}",
            settings.tolerance
        )));
    }
    if settings.max_steps == 0 {
        return Err(GibraltarError::InvalidOptions(
            "max_steps must be at least 1".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_state(y: &State) -> GibraltarResult<()> {
    if y.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(GibraltarError::InvalidOptions(format!(
            "initial levels must be finite, got sill={} basin={}",
            y[0], y[1]
        )))
    }
}

/// Integrates the model over the Mediterranean hypsometry.
///
/// Returns an error only for invalid options. A run that stops early is
/// returned as a truncated [`Trajectory`] whose `outcome` says where and why;
/// use [`Trajectory::into_result`] to treat that as an error.
pub fn integrate(
    parameters: &Parameters,
    options: &IntegrationOptions,
) -> GibraltarResult<Trajectory> {
    SillBasinModel::new(*parameters).integrate(options)
}

impl SillBasinModel {
    /// Integrates from `t = 0` for `options.integration_time_kyr`.
    pub fn integrate(&self, options: &IntegrationOptions) -> GibraltarResult<Trajectory> {
        options.validate()?;
        let t_end = kyr_to_seconds(options.integration_time_kyr);
        let y0 = State::new(options.sill_level0, options.basin_level0);
        Ok(self.run(0.0, t_end, y0, &options.solver_settings()))
    }

    /// Integrates over an arbitrary span `[t0, t1]` in seconds.
    pub fn integrate_span(
        &self,
        t0: f64,
        t1: f64,
        y0: State,
        settings: &SolverSettings,
    ) -> GibraltarResult<Trajectory> {
        validate_settings(settings)?;
        validate_state(&y0)?;
        if !(t0.is_finite() && t1.is_finite()) || t1 < t0 {
            return Err(GibraltarError::InvalidOptions(format!(
                "invalid time span [{}, {}]",
                t0, t1
            )));
        }
        Ok(self.run(t0, t1, y0, settings))
    }

    fn run(&self, t0: f64, t1: f64, y0: State, settings: &SolverSettings) -> Trajectory {
        if t1 == t0 {
            return Trajectory::from_samples(
                vec![t0],
                vec![y0],
                &self.hypsometry,
                Outcome::Completed,
                Default::default(),
            );
        }

        let segment = solve_segment(&self.parameters, &self.hypsometry, t0, t1, y0, settings);
        let outcome = match segment.stop {
            None => Outcome::Completed,
            Some(reason) => {
                let time = segment.times.last().copied().unwrap_or(t0);
                warn!(
                    time,
                    end_time = t1,
                    %reason,
                    "Integration stopped before the end time"
                );
                Outcome::Stopped { time, reason }
            }
        };
        debug!(
            samples = segment.times.len(),
            evaluations = segment.stats.evaluations,
            accepted = segment.stats.accepted_steps,
            rejected = segment.stats.rejected_steps,
            "Integration finished"
        );
        Trajectory::from_samples(
            segment.times,
            segment.states,
            &self.hypsometry,
            outcome,
            segment.stats,
        )
    }
}
