//! Adaptive Rosenbrock solver for stiff stretches of a trajectory
//!
//! Implements the L-stable second order Rosenbrock method with a third order
//! error estimate of Shampine & Reichelt (1997), the scheme behind MATLAB's
//! `ode23s`. The system is autonomous, so no time-derivative term is needed.
//! The Jacobian is approximated by forward differences at every step; for a
//! two-dimensional state that is only two extra rate evaluations.
//!
//! # References
//!
//! Shampine, L. F., & Reichelt, M. W. (1997). The MATLAB ODE Suite.
//! SIAM Journal on Scientific Computing, 18(1), 1-22.

use std::cell::Cell;
use std::f64::consts::SQRT_2;

use nalgebra::Matrix2;

use crate::rates::State;
use crate::trajectory::{SolverStats, StopReason};

/// Step control settings.
#[derive(Debug, Clone, Copy)]
pub struct RosenbrockOptions {
    pub rtol: f64,
    pub atol: f64,
    pub max_steps: usize,
}

/// Samples at every accepted step, starting with the initial point.
#[derive(Debug, Clone)]
pub struct RosenbrockSolution {
    pub times: Vec<f64>,
    pub states: Vec<State>,
    pub stats: SolverStats,
    /// Set when the solver halted before `t_end`
    pub stop: Option<StopReason>,
}

const SAFETY: f64 = 0.8;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;

/// Integrates `dy/dt = f(y)` from `t0` to `t_end`.
pub fn solve<F>(
    f: F,
    t0: f64,
    t_end: f64,
    y0: State,
    options: RosenbrockOptions,
) -> RosenbrockSolution
where
    F: Fn(&State) -> State,
{
    let d = 1.0 / (2.0 + SQRT_2);
    let e32 = 6.0 + SQRT_2;

    let mut stats = SolverStats::default();
    let mut times = vec![t0];
    let mut states = vec![y0];

    let evaluations = Cell::new(0u64);
    let eval = |y: &State| {
        evaluations.set(evaluations.get() + 1);
        f(y)
    };

    let mut t = t0;
    let mut y = y0;
    let mut f0 = eval(&y);
    if !is_finite(&f0) {
        stats.evaluations = evaluations.get();
        return RosenbrockSolution {
            times,
            states,
            stats,
            stop: Some(StopReason::NonFinite),
        };
    }

    let span = t_end - t0;
    let scale = y.amax() + options.atol;
    let mut h = (0.01 * scale / f0.amax().max(f64::MIN_POSITIVE)).min(span);
    let mut steps = 0usize;
    let mut stop = None;

    while t < t_end {
        if steps >= options.max_steps {
            stop = Some(StopReason::MaxStepsReached);
            break;
        }
        let remaining = t_end - t;
        let last = h >= remaining;
        if last {
            h = remaining;
        }
        if h <= 16.0 * f64::EPSILON * t.abs().max(1.0) {
            stop = Some(StopReason::StepSizeUnderflow);
            break;
        }
        steps += 1;

        let jacobian = match finite_difference_jacobian(&eval, &y, &f0) {
            Some(j) => j,
            None => {
                stop = Some(StopReason::NonFinite);
                break;
            }
        };
        let w = Matrix2::identity() - jacobian * (h * d);
        let lu = w.lu();

        let Some(k1) = lu.solve(&f0) else {
            stats.rejected_steps += 1;
            h *= MIN_FACTOR;
            continue;
        };
        let f1 = eval(&(y + k1 * (0.5 * h)));
        if !is_finite(&f1) {
            stop = Some(StopReason::NonFinite);
            break;
        }
        let Some(k2) = lu.solve(&(f1 - k1)).map(|k| k + k1) else {
            stats.rejected_steps += 1;
            h *= MIN_FACTOR;
            continue;
        };
        let y_new = y + k2 * h;
        let f2 = eval(&y_new);
        if !is_finite(&f2) {
            stop = Some(StopReason::NonFinite);
            break;
        }
        let Some(k3) = lu.solve(&(f2 - (k2 - f1) * e32 - (k1 - f0) * 2.0)) else {
            stats.rejected_steps += 1;
            h *= MIN_FACTOR;
            continue;
        };

        let error = (k1 - k2 * 2.0 + k3) * (h / 6.0);
        let mut norm: f64 = 0.0;
        for i in 0..2 {
            let tolerance = options.atol + options.rtol * y[i].abs().max(y_new[i].abs());
            norm = norm.max(error[i].abs() / tolerance);
        }

        let factor = if norm == 0.0 {
            MAX_FACTOR
        } else {
            (SAFETY * norm.powf(-1.0 / 3.0)).clamp(MIN_FACTOR, MAX_FACTOR)
        };

        if norm <= 1.0 {
            t = if last { t_end } else { t + h };
            y = y_new;
            f0 = f2;
            times.push(t);
            states.push(y);
            stats.accepted_steps += 1;
            h *= factor;
        } else {
            stats.rejected_steps += 1;
            h *= factor.min(1.0);
        }
    }

    stats.evaluations = evaluations.get();
    RosenbrockSolution {
        times,
        states,
        stats,
        stop,
    }
}

fn finite_difference_jacobian<F>(eval: &F, y: &State, f0: &State) -> Option<Matrix2<f64>>
where
    F: Fn(&State) -> State,
{
    let mut jacobian = Matrix2::zeros();
    for j in 0..2 {
        let delta = f64::EPSILON.sqrt() * y[j].abs().max(1.0);
        let mut shifted = *y;
        shifted[j] += delta;
        let f1 = eval(&shifted);
        if !is_finite(&f1) {
            return None;
        }
        jacobian.set_column(j, &((f1 - f0) / delta));
    }
    Some(jacobian)
}

fn is_finite(y: &State) -> bool {
    y.iter().all(|v| v.is_finite())
}
