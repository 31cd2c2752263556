//! Fixed points of the sill/basin system
//!
//! A fixed point is a state where the sill erodes exactly as fast as it is
//! uplifted and the discharge over it balances the net evaporation of the
//! basin. Roots are found with Newton's method using a forward-difference
//! Jacobian; [`index`] then computes the Poincaré index of a point from the
//! winding of the vector field around it.

use std::f64::consts::PI;

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::model::SillBasinModel;
use crate::rates::State;

/// Why a Newton iteration did not converge.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewtonFailure {
    #[error("Jacobian is singular")]
    SingularJacobian,
    #[error("Too many iterations")]
    MaxIterations,
    #[error("Iterate contains NaN or infinity")]
    NonFinite,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewtonOptions {
    /// Bound on both the update and the residual (infinity norm)
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Smallest Jacobian perturbation
    pub abs_jacobian_step: f64,
    /// Jacobian perturbation relative to the state
    pub rel_jacobian_step: f64,
}

impl Default for NewtonOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            max_iterations: 100,
            abs_jacobian_step: 1e-7,
            rel_jacobian_step: 1e-7,
        }
    }
}

/// Runs Newton's method from `guess`.
pub fn newton(
    model: &SillBasinModel,
    guess: State,
    options: &NewtonOptions,
) -> Result<State, NewtonFailure> {
    let mut x = guess;
    for iteration in 0..options.max_iterations {
        let f = model.derivatives(&x);
        let mut jacobian = nalgebra::Matrix2::zeros();
        for j in 0..2 {
            let step = options.abs_jacobian_step.max(x[j].abs() * options.rel_jacobian_step);
            let mut shifted = x;
            shifted[j] += step;
            jacobian.set_column(j, &((model.derivatives(&shifted) - f) / step));
        }
        let delta = jacobian
            .lu()
            .solve(&(-f))
            .ok_or(NewtonFailure::SingularJacobian)?;
        x += delta;
        if !x.iter().all(|v| v.is_finite()) {
            return Err(NewtonFailure::NonFinite);
        }
        let residual = model.derivatives(&x);
        if delta.amax() <= options.tolerance && residual.amax() <= options.tolerance {
            debug!(iteration, sill_level = x[0], basin_level = x[1], "Newton converged");
            return Ok(x);
        }
    }
    Err(NewtonFailure::MaxIterations)
}

/// Rectangular grid of starting points for [`search_grid`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchGrid {
    /// Lowest and highest sill level
    /// unit: m
    pub sill_range: (f64, f64),
    /// Lowest and highest basin level
    /// unit: m
    pub basin_range: (f64, f64),
    pub sill_points: usize,
    pub basin_points: usize,
}

impl Default for SearchGrid {
    fn default() -> Self {
        Self {
            sill_range: (-250.0, -0.5),
            basin_range: (-1000.0, -0.5),
            sill_points: 50,
            basin_points: 50,
        }
    }
}

/// Scans the grid and returns the first root Newton's method converges to.
pub fn search_grid(
    model: &SillBasinModel,
    grid: &SearchGrid,
    options: &NewtonOptions,
) -> Option<State> {
    let sills = Array1::linspace(grid.sill_range.0, grid.sill_range.1, grid.sill_points);
    let basins = Array1::linspace(grid.basin_range.0, grid.basin_range.1, grid.basin_points);
    for &sill in sills.iter() {
        for &basin in basins.iter() {
            if let Ok(root) = newton(model, State::new(sill, basin), options) {
                return Some(root);
            }
        }
    }
    None
}

/// Poincaré index of `point`: the number of turns the vector field makes
/// along a circle of `radius` metres around it, sampled at `samples` points.
///
/// Close to an integer for an isolated fixed point; zero for a regular point.
pub fn index(model: &SillBasinModel, point: State, radius: f64, samples: usize) -> f64 {
    let samples = samples.max(2);
    let angle_at = |i: usize| {
        let theta = 2.0 * PI * i as f64 / (samples - 1) as f64;
        let v = model.derivatives(&State::new(
            point[0] + radius * theta.cos(),
            point[1] + radius * theta.sin(),
        ));
        v[1].atan2(v[0])
    };

    let mut previous = angle_at(0);
    let mut total = 0.0;
    for i in 1..samples {
        let current = angle_at(i);
        let mut step = current - previous;
        // Unwrap jumps across the branch cut of atan2
        if step > PI {
            step -= 2.0 * PI;
        } else if step < -PI {
            step += 2.0 * PI;
        }
        total += step;
        previous = current;
    }
    total / (2.0 * PI)
}
