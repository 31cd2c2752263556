//! Rate functions
//!
//! Time derivatives of the sill level $z_s$ and basin level $z_m$. The
//! governing equations are:
//!
//! $$ \frac{dz_s}{dt} = U - k_b \max(\tau - \tau_c, 0)^a $$
//! $$ \frac{dz_m}{dt} = P - E + \frac{R + Q}{A(z_m)} $$
//!
//! with the channel slope $S = \max((z_o - z_m)/L, 0)$, the bed shear stress
//! $\tau = \rho g (z_o - z_s) S$ and the discharge over the sill
//!
//! $$ Q = \frac{T^{13/7}}{n} \max(z_o - z_s, 0)^{65/21} S^{13/14} $$
//!
//! where $T = C_w \left((\tau_c + U/k_b)/(\rho g)\right)^{-3/13}$ bundles the
//! Turowski channel width constants and $z_o$ is the compensated ocean level.
//!
//! The slope is clamped at zero. During very rapid filling the solver can
//! evaluate states where the basin sits a vanishing amount above the ocean;
//! a negative slope raised to 13/14 is NaN, which would poison the rest of the
//! run. The clamp is kept exactly even though it can hide spurious
//! near-oscillatory behaviour for some low `tauc`/low `kb` combinations.

use nalgebra::Vector2;

use crate::hypsometry::BasinHypsometry;
use crate::parameters::Parameters;
use crate::units::{GRAVITY, WATER_DENSITY};

/// Model state, `[sill level, basin level]` in metres.
pub type State = Vector2<f64>;

/// Turowski width bundle $T$.
///
/// Depends only on the parameters. It is recomputed on every evaluation.
pub fn width_factor(p: &Parameters) -> f64 {
    let stress = p.critical_shear_stress + p.uplift_rate / p.erodability;
    p.width_coefficient * (stress / (WATER_DENSITY * GRAVITY)).powf(-3.0 / 13.0)
}

/// Channel slope between the ocean and the basin surface, never negative.
pub fn channel_slope(p: &Parameters, h: &BasinHypsometry, basin_level: f64) -> f64 {
    let ocean_level = h.compensated_ocean_level(basin_level);
    ((ocean_level - basin_level) / p.stream_length).max(0.0)
}

/// Shear stress on the sill floor.
/// unit: Pa
pub fn shear_stress(p: &Parameters, h: &BasinHypsometry, sill_level: f64, basin_level: f64) -> f64 {
    let ocean_level = h.compensated_ocean_level(basin_level);
    let slope = channel_slope(p, h, basin_level);
    WATER_DENSITY * GRAVITY * (ocean_level - sill_level) * slope
}

/// Water discharge over the sill into the basin.
/// unit: m^3/s
pub fn discharge(p: &Parameters, h: &BasinHypsometry, sill_level: f64, basin_level: f64) -> f64 {
    let ocean_level = h.compensated_ocean_level(basin_level);
    let slope = channel_slope(p, h, basin_level);
    let depth = (ocean_level - sill_level).max(0.0);
    (width_factor(p).powf(13.0 / 7.0) / p.roughness)
        * depth.powf(65.0 / 21.0)
        * slope.powf(13.0 / 14.0)
}

/// Rate of change of the sill level.
/// unit: m/s
pub fn sill_rate(p: &Parameters, h: &BasinHypsometry, sill_level: f64, basin_level: f64) -> f64 {
    let tau = shear_stress(p, h, sill_level, basin_level);
    // No erosion below the critical shear stress
    let excess = (tau - p.critical_shear_stress).max(0.0);
    p.uplift_rate - p.erodability * excess.powf(p.erosion_exponent)
}

/// Rate of change of the basin level.
/// unit: m/s
pub fn basin_rate(p: &Parameters, h: &BasinHypsometry, sill_level: f64, basin_level: f64) -> f64 {
    let q = discharge(p, h, sill_level, basin_level);
    p.precipitation - p.evaporation + (p.river_discharge + q) / h.basin_area(basin_level)
}

/// Both derivatives for a state vector.
pub fn derivatives(p: &Parameters, h: &BasinHypsometry, y: &State) -> State {
    State::new(sill_rate(p, h, y[0], y[1]), basin_rate(p, h, y[0], y[1]))
}

/// Every intermediate quantity of one rate evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateDiagnostics {
    pub ocean_level: f64,
    pub basin_area: f64,
    pub slope: f64,
    pub shear_stress: f64,
    pub width_factor: f64,
    pub discharge: f64,
    pub sill_rate: f64,
    pub basin_rate: f64,
}

impl RateDiagnostics {
    pub fn evaluate(
        p: &Parameters,
        h: &BasinHypsometry,
        sill_level: f64,
        basin_level: f64,
    ) -> Self {
        Self {
            ocean_level: h.compensated_ocean_level(basin_level),
            basin_area: h.basin_area(basin_level),
            slope: channel_slope(p, h, basin_level),
            shear_stress: shear_stress(p, h, sill_level, basin_level),
            width_factor: width_factor(p),
            discharge: discharge(p, h, sill_level, basin_level),
            sill_rate: sill_rate(p, h, sill_level, basin_level),
            basin_rate: basin_rate(p, h, sill_level, basin_level),
        }
    }

    /// Whether every quantity is a finite number.
    pub fn is_finite(&self) -> bool {
        [
            self.ocean_level,
            self.basin_area,
            self.slope,
            self.shear_stress,
            self.width_factor,
            self.discharge,
            self.sill_rate,
            self.basin_rate,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}
