//! Long-term behaviour of a trajectory
//!
//! The model is integrated in fixed intervals for a very long time. After
//! each interval the state is checked:
//!
//! - a sill above the ocean never erodes again, so the basin stays cut off
//!   and desiccated;
//! - if both rates are negligible and Newton's method converges to a root
//!   right next to the current state, the system has settled on a fixed
//!   point with steady flow over an eroding sill;
//! - a run that reaches the time limit without either is taken to oscillate.

use approx::relative_eq;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{GibraltarError, GibraltarResult};
use crate::fixed_point::{newton, NewtonOptions};
use crate::ivp::{Method, SolverSettings};
use crate::model::SillBasinModel;
use crate::rates::State;
use crate::trajectory::Outcome;
use crate::units::{kyr_to_seconds, mm_per_year_to_m_per_second};

/// Long-term regime of the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regime {
    /// Fixed point with the sill below the ocean and steady flow
    SteadyErodingSill,
    /// Repeated cut-off and refilling
    Oscillating,
    /// Sill uplifted above the ocean; the basin is permanently cut off
    Desiccated,
}

impl Regime {
    /// Integer code used in sweep tables: -1, 0 and 1.
    pub fn code(&self) -> i32 {
        match self {
            Regime::SteadyErodingSill => -1,
            Regime::Oscillating => 0,
            Regime::Desiccated => 1,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Regime::SteadyErodingSill => "stable with an eroding sill",
            Regime::Oscillating => "oscillating",
            Regime::Desiccated => "stable after cutoff and desiccation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyOptions {
    /// unit: m
    pub sill_level0: f64,
    /// unit: m
    pub basin_level0: f64,
    /// Length of each integration interval
    /// unit: kyr
    pub interval_kyr: f64,
    /// Total integration time before giving up and calling it oscillating
    /// unit: kyr
    pub limit_kyr: f64,
    /// Largest rate magnitude regarded as stationary
    /// unit: m/s
    pub stationary_rate: f64,
    /// Relative distance between the state and a Newton root for them to coincide
    pub root_closeness: f64,
    pub tolerance: f64,
    pub method: Method,
    pub max_steps: usize,
    pub newton: NewtonOptions,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            sill_level0: -60.0,
            basin_level0: 0.0,
            interval_kyr: 25.0,
            limit_kyr: 1e5,
            stationary_rate: mm_per_year_to_m_per_second(1e-3),
            root_closeness: 1e-4,
            tolerance: 1e-7,
            method: Method::Auto,
            max_steps: 100_000,
            newton: NewtonOptions::default(),
        }
    }
}

/// Regime and where it was decided.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub regime: Regime,
    /// unit: s
    pub time: f64,
    /// unit: m
    pub sill_level: f64,
    /// unit: m
    pub basin_level: f64,
}

impl SillBasinModel {
    /// Integrates interval by interval until the long-term regime is clear.
    pub fn classify(&self, options: &ClassifyOptions) -> GibraltarResult<Classification> {
        if !(options.interval_kyr > 0.0 && options.interval_kyr.is_finite()) {
            return Err(GibraltarError::InvalidOptions(format!(
                "interval must be positive, got {} kyr",
                options.interval_kyr
            )));
        }
        let settings = SolverSettings {
            method: options.method,
            tolerance: options.tolerance,
            max_steps: options.max_steps,
        };
        let interval = kyr_to_seconds(options.interval_kyr);
        let limit = kyr_to_seconds(options.limit_kyr);

        let mut t = 0.0;
        let mut y = State::new(options.sill_level0, options.basin_level0);
        while t < limit {
            let t_next = (t + interval).min(limit);
            let trajectory = self.integrate_span(t, t_next, y, &settings)?;
            if let Outcome::Stopped { time, reason } = trajectory.outcome {
                return Err(GibraltarError::IntegrationStopped { time, reason });
            }
            t = t_next;
            y = trajectory.final_state().unwrap_or(y);

            if let Some(regime) = self.check_state(&y, options) {
                info!(
                    regime = regime.description(),
                    t,
                    sill_level = y[0],
                    basin_level = y[1],
                    "Classified trajectory"
                );
                return Ok(Classification {
                    regime,
                    time: t,
                    sill_level: y[0],
                    basin_level: y[1],
                });
            }
            debug!(t, sill_level = y[0], basin_level = y[1], "Interval finished");
        }

        Ok(Classification {
            regime: Regime::Oscillating,
            time: t,
            sill_level: y[0],
            basin_level: y[1],
        })
    }

    fn check_state(&self, y: &State, options: &ClassifyOptions) -> Option<Regime> {
        if y[0] > self.ocean_level(y[1]) {
            return Some(Regime::Desiccated);
        }
        let rates = self.derivatives(y);
        if rates[0].abs() < options.stationary_rate && rates[1].abs() < options.stationary_rate {
            if let Ok(root) = newton(self, *y, &options.newton) {
                let close = |a: f64, b: f64| {
                    relative_eq!(a, b, epsilon = 0.0, max_relative = options.root_closeness)
                };
                if close(root[0], y[0]) && close(root[1], y[1]) {
                    return Some(Regime::SteadyErodingSill);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::Parameters;

    #[test]
    fn test_regime_codes() {
        assert_eq!(Regime::SteadyErodingSill.code(), -1);
        assert_eq!(Regime::Oscillating.code(), 0);
        assert_eq!(Regime::Desiccated.code(), 1);
    }

    #[test]
    fn test_suppressed_erosion_desiccates() {
        // Without erosion the sill rises 4.9 mm/yr and crosses the ocean level
        // within the first interval
        let model = SillBasinModel::new(Parameters {
            critical_shear_stress: 1e12,
            ..Parameters::default()
        });
        let c = model.classify(&ClassifyOptions::default()).unwrap();
        assert_eq!(c.regime, Regime::Desiccated);
        assert_eq!(c.time, kyr_to_seconds(25.0));
        assert!(c.sill_level > model.ocean_level(c.basin_level));
    }

    #[test]
    fn test_limit_reached_counts_as_oscillating() {
        let model = SillBasinModel::default();
        let options = ClassifyOptions {
            interval_kyr: 1.0,
            limit_kyr: 2.0,
            ..ClassifyOptions::default()
        };
        let c = model.classify(&options).unwrap();
        assert_eq!(c.regime, Regime::Oscillating);
        assert_eq!(c.time, kyr_to_seconds(2.0));
    }

    #[test]
    fn test_fixed_point_state_is_steady() {
        let model = SillBasinModel::default();
        let root = crate::fixed_point::search_grid(
            &model,
            &crate::fixed_point::SearchGrid::default(),
            &NewtonOptions::default(),
        )
        .expect("fixed point");
        let options = ClassifyOptions::default();
        assert_eq!(
            model.check_state(&root, &options),
            Some(Regime::SteadyErodingSill)
        );
        // Away from the root the rates are far from stationary
        let away = State::new(root[0] - 20.0, root[1]);
        assert_eq!(model.check_state(&away, &options), None);
    }

    #[test]
    fn test_invalid_interval() {
        let options = ClassifyOptions {
            interval_kyr: 0.0,
            ..ClassifyOptions::default()
        };
        assert!(SillBasinModel::default().classify(&options).is_err());
    }
}
