//! Basin hypsometry
//!
//! Closed-form relation between basin water level and basin surface area,
//! together with the external ocean level implied by volume conservation.
//!
//! The area is a double exponential in level,
//!
//! $$ A(z) = c_1 e^{z/\alpha_1} + c_2 e^{z/\alpha_2} $$
//!
//! and the ocean level follows from spreading the volume the basin has lost
//! between `z` and the reference level 0 over the world ocean area $A_o$:
//!
//! $$ z_o(z) = \frac{c_1 \alpha_1}{A_o}(1 - e^{z/\alpha_1})
//!   + \frac{c_2 \alpha_2}{A_o}(1 - e^{z/\alpha_2}) $$
//!
//! Both functions read the same constants, so they always describe the same
//! basin. Alternative fits can be supplied by constructing a different
//! [`BasinHypsometry`] value.

use serde::{Deserialize, Serialize};

/// Fitted constants describing one basin and the ocean outside it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasinHypsometry {
    /// Amplitude of the slowly decaying (deep basin) term, $c_1$
    /// unit: m^2
    pub broad_amplitude: f64,
    /// Decay length of the deep basin term, $\alpha_1$
    /// unit: m
    pub broad_length: f64,
    /// Amplitude of the rapidly decaying (continental shelf) term, $c_2$
    /// unit: m^2
    pub shelf_amplitude: f64,
    /// Decay length of the shelf term, $\alpha_2$
    /// unit: m
    pub shelf_length: f64,
    /// Area of the world ocean excluding the basin, $A_o$
    /// unit: m^2
    pub ocean_area: f64,
}

impl BasinHypsometry {
    /// Fit to the digitised Mediterranean hypsometry of Meijer & Krijgsman (2005).
    ///
    /// The ocean area excludes the Mediterranean (ETOPO1 ocean volumes).
    pub const MEDITERRANEAN: BasinHypsometry = BasinHypsometry {
        broad_amplitude: 2.068e12,
        broad_length: 2754.0,
        shelf_amplitude: 4.035e11,
        shelf_length: 127.5,
        ocean_area: 360.0e12,
    };

    /// Surface area of the basin when its water stands at `level`.
    ///
    /// Physically meaningful for `level <= 0`.
    pub fn basin_area(&self, level: f64) -> f64 {
        self.broad_amplitude * (level / self.broad_length).exp()
            + self.shelf_amplitude * (level / self.shelf_length).exp()
    }

    /// Ocean level when a basin drawdown to `level` is fully compensated
    /// by the world ocean.
    pub fn compensated_ocean_level(&self, level: f64) -> f64 {
        let broad = self.broad_amplitude * self.broad_length / self.ocean_area;
        let shelf = self.shelf_amplitude * self.shelf_length / self.ocean_area;
        broad * (1.0 - (level / self.broad_length).exp())
            + shelf * (1.0 - (level / self.shelf_length).exp())
    }

    /// Water volume held in the basin between `level` and the reference level.
    /// unit: m^3
    pub fn displaced_volume(&self, level: f64) -> f64 {
        self.ocean_area * self.compensated_ocean_level(level)
    }
}

impl Default for BasinHypsometry {
    fn default() -> Self {
        Self::MEDITERRANEAN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_area_positive_at_reference_level() {
        let h = BasinHypsometry::default();
        assert!(h.basin_area(0.0) > 0.0);
        assert_abs_diff_eq!(h.basin_area(0.0), 2.068e12 + 4.035e11);
    }

    #[test]
    fn test_area_strictly_increasing() {
        let h = BasinHypsometry::default();
        let mut previous = h.basin_area(-2000.0);
        for step in 1..=2000 {
            let level = -2000.0 + step as f64;
            let area = h.basin_area(level);
            assert!(
                area > previous,
                "Area should increase with level, A({}) = {} <= {}",
                level,
                area,
                previous
            );
            previous = area;
        }
    }

    #[test]
    fn test_no_compensation_at_reference_level() {
        let h = BasinHypsometry::default();
        assert_abs_diff_eq!(h.compensated_ocean_level(0.0), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_drawdown_raises_ocean() {
        let h = BasinHypsometry::default();
        let zo = h.compensated_ocean_level(-1500.0);
        // Emptying most of the Mediterranean raises the world ocean by ~10 m
        assert!(zo > 5.0 && zo < 20.0, "zo = {}", zo);
    }

    #[test]
    fn test_alternative_fit_is_used() {
        let h = BasinHypsometry {
            shelf_amplitude: 0.0,
            ..BasinHypsometry::default()
        };
        assert_abs_diff_eq!(h.basin_area(0.0), 2.068e12);
    }
}
