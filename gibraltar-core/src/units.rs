//! Unit conversions and physical constants
//!
//! Every quantity inside the model is in SI units (metres, seconds, pascals).
//! The only exception at the public boundary is the integration duration,
//! which callers give in kiloyears; it is converted here and nowhere else.

/// Seconds in a Julian year
/// unit: s
pub const YEAR_SECONDS: f64 = 31_557_600.0;

/// Seconds in one thousand years
/// unit: s
pub const KYR_SECONDS: f64 = 1e3 * YEAR_SECONDS;

/// Divisor converting a rate in mm/yr to m/s
pub const MM_PER_YEAR: f64 = 1e3 * YEAR_SECONDS;

/// Density of water
/// unit: kg / m^3
pub const WATER_DENSITY: f64 = 1e3;

/// Gravitational acceleration
/// unit: m / s^2
pub const GRAVITY: f64 = 9.8;

/// Converts a duration in kiloyears to seconds.
pub fn kyr_to_seconds(kyr: f64) -> f64 {
    kyr * KYR_SECONDS
}

/// Converts a duration in seconds to kiloyears.
pub fn seconds_to_kyr(seconds: f64) -> f64 {
    seconds / KYR_SECONDS
}

/// Converts a rate given per year (e.g. m/yr) to the same rate per second.
pub fn per_year_to_per_second(rate: f64) -> f64 {
    rate / YEAR_SECONDS
}

/// Converts a rate in mm/yr to m/s.
pub fn mm_per_year_to_m_per_second(rate: f64) -> f64 {
    rate / MM_PER_YEAR
}

/// Converts a rate in m/s to mm/yr.
pub fn m_per_second_to_mm_per_year(rate: f64) -> f64 {
    rate * MM_PER_YEAR
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_kyr_round_trip() {
        assert_relative_eq!(seconds_to_kyr(kyr_to_seconds(100.0)), 100.0);
        assert_relative_eq!(kyr_to_seconds(1.0), 31_557_600_000.0);
    }

    #[test]
    fn test_per_year_conversion() {
        // 1.2 m/yr of evaporation
        assert_relative_eq!(per_year_to_per_second(1.2), 1.2 / 31_557_600.0);
        assert_relative_eq!(per_year_to_per_second(YEAR_SECONDS), 1.0);
    }

    #[test]
    fn test_uplift_conversion() {
        // 4.9 mm/yr is roughly 1.55e-10 m/s
        let rate = mm_per_year_to_m_per_second(4.9);
        assert_relative_eq!(rate, 4.9 / 31_557_600_000.0);
        assert_relative_eq!(m_per_second_to_mm_per_year(rate), 4.9);
    }
}
