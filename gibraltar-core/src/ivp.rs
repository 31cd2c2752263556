//! Bridge between the rate functions and the adaptive solvers
//!
//! The explicit Dormand–Prince solvers come from `ode_solvers`; the stiff
//! fallback is the in-crate Rosenbrock method. Each solver run over one span
//! is a [`Segment`], which the integrator stitches into a trajectory.

use std::cell::{Cell, RefCell};

use ode_solvers::dop_shared::{IntegrationError, OutputType};
use ode_solvers::{Dop853, Dopri5, System};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::hypsometry::BasinHypsometry;
use crate::parameters::Parameters;
use crate::rates::{derivatives, State};
use crate::rosenbrock::{self, RosenbrockOptions};
use crate::trajectory::{SolverStats, StopReason};

/// Integration algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Dormand–Prince 5(4), switching to the Rosenbrock method once stiffness
    /// is detected
    #[default]
    Auto,
    /// Dormand–Prince 5(4) only
    Dopri5,
    /// Dormand–Prince 8(5,3) only
    Dop853,
    /// Rosenbrock 2(3) only
    Rosenbrock,
}

/// Settings shared by every solver segment of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSettings {
    pub method: Method,
    /// Used for both the absolute and the relative tolerance
    pub tolerance: f64,
    pub max_steps: usize,
}

/// Accepted samples of one solver run over `[t0, t1]`.
#[derive(Debug, Clone)]
pub(crate) struct Segment {
    pub times: Vec<f64>,
    pub states: Vec<State>,
    pub stats: SolverStats,
    pub stop: Option<StopReason>,
}

/// Accepted steps between stiffness tests of the explicit solvers.
const STIFFNESS_TEST_INTERVAL: u32 = 1000;

/// What an explicit solver run reports back through its [`System`].
///
/// Accepted samples are taken from `solout` rather than the stepper's own
/// sparse output, which for `Dop853` carries the start time on every sample.
#[derive(Debug, Default)]
struct SolverMonitor {
    non_finite: Cell<bool>,
    evaluations: Cell<u64>,
    samples: RefCell<Vec<(f64, State)>>,
}

/// The ODE system as seen by `ode_solvers`.
///
/// Any non-finite derivative is flagged on the monitor; the solver is then
/// halted at the next accepted step through `solout`.
struct SillBasinSystem<'a> {
    parameters: &'a Parameters,
    hypsometry: &'a BasinHypsometry,
    monitor: &'a SolverMonitor,
}

impl System<f64, State> for SillBasinSystem<'_> {
    fn system(&self, _t: f64, y: &State, dy: &mut State) {
        let evaluations = &self.monitor.evaluations;
        evaluations.set(evaluations.get() + 1);
        *dy = derivatives(self.parameters, self.hypsometry, y);
        if !dy.iter().all(|v| v.is_finite()) {
            self.monitor.non_finite.set(true);
        }
    }

    fn solout(&mut self, t: f64, y: &State, _dy: &State) -> bool {
        self.monitor.samples.borrow_mut().push((t, *y));
        self.monitor.non_finite.get()
    }
}

/// Runs the configured method over `[t0, t1]`.
pub(crate) fn solve_segment(
    parameters: &Parameters,
    hypsometry: &BasinHypsometry,
    t0: f64,
    t1: f64,
    y0: State,
    settings: &SolverSettings,
) -> Segment {
    if !derivatives(parameters, hypsometry, &y0)
        .iter()
        .all(|v| v.is_finite())
    {
        debug!(t0, "Rates are not finite at the initial state");
        return Segment {
            times: vec![t0],
            states: vec![y0],
            stats: SolverStats {
                evaluations: 1,
                ..SolverStats::default()
            },
            stop: Some(StopReason::NonFinite),
        };
    }
    match settings.method {
        Method::Dopri5 | Method::Dop853 => {
            explicit(parameters, hypsometry, t0, t1, y0, settings, settings.method)
        }
        Method::Rosenbrock => stiff(parameters, hypsometry, t0, t1, y0, settings),
        Method::Auto => {
            let mut segment =
                explicit(parameters, hypsometry, t0, t1, y0, settings, Method::Dopri5);
            if segment.stop != Some(StopReason::Stiffness) {
                return segment;
            }
            let t_switch = segment.times.last().copied().unwrap_or(t0);
            let y_switch = segment.states.last().copied().unwrap_or(y0);
            info!(
                t = t_switch,
                sill_level = y_switch[0],
                basin_level = y_switch[1],
                "Stiffness detected, switching to Rosenbrock solver"
            );
            let tail = stiff(parameters, hypsometry, t_switch, t1, y_switch, settings);
            // The tail starts with the switch point, which is already stored
            segment.times.extend(tail.times.into_iter().skip(1));
            segment.states.extend(tail.states.into_iter().skip(1));
            segment.stats.absorb(tail.stats);
            segment.stats.method_switches += 1;
            segment.stop = tail.stop;
            segment
        }
    }
}

fn explicit(
    parameters: &Parameters,
    hypsometry: &BasinHypsometry,
    t0: f64,
    t1: f64,
    y0: State,
    settings: &SolverSettings,
    method: Method,
) -> Segment {
    let monitor = SolverMonitor::default();
    let system = SillBasinSystem {
        parameters,
        hypsometry,
        monitor: &monitor,
    };
    let tol = settings.tolerance;
    let max_steps = u32::try_from(settings.max_steps).unwrap_or(u32::MAX);
    let span = t1 - t0;

    let result = if method == Method::Dop853 {
        Dop853::from_param(
            system,
            t0,
            t1,
            0.0,
            y0,
            tol,
            tol,
            0.9,
            0.0,
            0.333,
            6.0,
            span,
            0.0,
            max_steps,
            STIFFNESS_TEST_INTERVAL,
            OutputType::Sparse,
        )
        .integrate()
    } else {
        Dopri5::from_param(
            system,
            t0,
            t1,
            0.0,
            y0,
            tol,
            tol,
            0.9,
            0.04,
            0.2,
            10.0,
            span,
            0.0,
            max_steps,
            STIFFNESS_TEST_INTERVAL,
            OutputType::Sparse,
        )
        .integrate()
    };

    let (times, states): (Vec<f64>, Vec<State>) =
        monitor.samples.take().into_iter().unzip();
    let (accepted_steps, rejected_steps, mut stop) = match result {
        Ok(stats) => (
            u64::from(stats.accepted_steps),
            u64::from(stats.rejected_steps),
            None,
        ),
        Err(error) => {
            let reason = match error {
                IntegrationError::StiffnessDetected { .. } => StopReason::Stiffness,
                IntegrationError::MaxNumStepReached { .. } => StopReason::MaxStepsReached,
                _ => StopReason::StepSizeUnderflow,
            };
            // The stepper keeps its counters to itself on failure
            (times.len() as u64, 0, Some(reason))
        }
    };
    let stats = SolverStats {
        evaluations: monitor.evaluations.get(),
        accepted_steps,
        rejected_steps,
        method_switches: 0,
    };

    let (mut times, mut states) = with_initial_point(times, states, t0, y0);
    let valid = times
        .iter()
        .zip(&states)
        .take_while(|(t, y)| t.is_finite() && y.iter().all(|v| v.is_finite()))
        .count();
    if monitor.non_finite.get() || valid < times.len() {
        times.truncate(valid);
        states.truncate(valid);
        stop = Some(StopReason::NonFinite);
    }
    if let (None, Some(last)) = (stop, times.last_mut()) {
        // Rounding in the last step size
        if (t1 - *last).abs() <= 1e-12 * t1.abs().max(1.0) {
            *last = t1;
        }
    }

    debug!(
        ?method,
        t0,
        t1,
        samples = times.len(),
        evaluations = stats.evaluations,
        accepted = stats.accepted_steps,
        ?stop,
        "Explicit segment finished"
    );
    Segment {
        times,
        states,
        stats,
        stop,
    }
}

fn stiff(
    parameters: &Parameters,
    hypsometry: &BasinHypsometry,
    t0: f64,
    t1: f64,
    y0: State,
    settings: &SolverSettings,
) -> Segment {
    let options = RosenbrockOptions {
        rtol: settings.tolerance,
        atol: settings.tolerance,
        max_steps: settings.max_steps,
    };
    let solution = rosenbrock::solve(
        |y| derivatives(parameters, hypsometry, y),
        t0,
        t1,
        y0,
        options,
    );
    debug!(
        t0,
        t1,
        samples = solution.times.len(),
        accepted = solution.stats.accepted_steps,
        stop = ?solution.stop,
        "Rosenbrock segment finished"
    );
    Segment {
        times: solution.times,
        states: solution.states,
        stats: solution.stats,
        stop: solution.stop,
    }
}

/// Makes sure the samples start exactly at the initial condition.
fn with_initial_point(
    mut times: Vec<f64>,
    mut states: Vec<State>,
    t0: f64,
    y0: State,
) -> (Vec<f64>, Vec<State>) {
    if times.first() != Some(&t0) {
        times.insert(0, t0);
        states.insert(0, y0);
    }
    (times, states)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(method: Method) -> SolverSettings {
        SolverSettings {
            method,
            tolerance: 1e-7,
            max_steps: 100_000,
        }
    }

    #[test]
    fn test_initial_point_inserted_once() {
        let (t, y) =
            with_initial_point(vec![1.0], vec![State::new(1.0, 1.0)], 0.0, State::zeros());
        assert_eq!(t, vec![0.0, 1.0]);
        assert_eq!(y[0], State::zeros());

        let (t, _) =
            with_initial_point(vec![0.0, 1.0], vec![State::zeros(); 2], 0.0, State::zeros());
        assert_eq!(t, vec![0.0, 1.0]);
    }

    #[test]
    fn test_methods_agree_over_short_span() {
        let p = Parameters::default();
        let h = BasinHypsometry::default();
        let y0 = State::new(-60.0, 0.0);
        let t1 = crate::units::kyr_to_seconds(1.0);
        let methods = [
            Method::Auto,
            Method::Dopri5,
            Method::Dop853,
            Method::Rosenbrock,
        ];

        let finals: Vec<State> = methods
            .iter()
            .map(|m| {
                let segment = solve_segment(&p, &h, 0.0, t1, y0, &settings(*m));
                assert!(segment.stop.is_none(), "{:?} stopped: {:?}", m, segment.stop);
                assert_eq!(*segment.times.last().unwrap(), t1, "{:?}", m);
                *segment.states.last().unwrap()
            })
            .collect();

        for y in &finals[1..] {
            assert!((y[0] - finals[0][0]).abs() < 1e-3, "{} vs {}", y[0], finals[0][0]);
            assert!((y[1] - finals[0][1]).abs() < 1e-2, "{} vs {}", y[1], finals[0][1]);
        }
    }

    #[test]
    fn test_explicit_samples_carry_step_times() {
        let p = Parameters::default();
        let h = BasinHypsometry::default();
        let t1 = crate::units::kyr_to_seconds(10.0);
        for method in [Method::Dopri5, Method::Dop853] {
            let segment =
                solve_segment(&p, &h, 0.0, t1, State::new(-60.0, 0.0), &settings(method));
            assert!(segment.times.len() > 2, "{:?}", method);
            assert_eq!(segment.times[0], 0.0);
            assert!(
                segment.times.windows(2).all(|w| w[1] > w[0]),
                "{:?} times not strictly increasing",
                method
            );
            assert_eq!(segment.times.len(), segment.states.len());
        }
    }

    #[test]
    fn test_explicit_stats_count_evaluations() {
        let p = Parameters::default();
        let h = BasinHypsometry::default();
        let t1 = crate::units::kyr_to_seconds(10.0);
        let y0 = State::new(-60.0, 0.0);

        let segment = solve_segment(&p, &h, 0.0, t1, y0, &settings(Method::Dopri5));
        assert!(segment.stats.accepted_steps > 0);
        // Six stages per step after the first evaluation
        assert!(segment.stats.evaluations >= 6 * segment.stats.accepted_steps);

        // A failed run still reports the work it did
        let starved = SolverSettings {
            max_steps: 3,
            ..settings(Method::Dopri5)
        };
        let segment = solve_segment(&p, &h, 0.0, t1, y0, &starved);
        assert_eq!(segment.stop, Some(StopReason::MaxStepsReached));
        assert!(segment.stats.evaluations > 0);
    }

    #[test]
    fn test_non_finite_rates_stop_explicit_solver() {
        let p = Parameters {
            roughness: 0.0,
            ..Parameters::default()
        };
        let h = BasinHypsometry::default();
        // With the basin drawn down the discharge is infinite
        let y0 = State::new(-60.0, -500.0);
        let segment = solve_segment(&p, &h, 0.0, 1e10, y0, &settings(Method::Dopri5));
        assert_eq!(segment.stop, Some(StopReason::NonFinite));
        assert_eq!(segment.times, vec![0.0]);
        assert_eq!(segment.states, vec![y0]);
    }
}
