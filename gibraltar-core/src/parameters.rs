//! Model parameters
//!
//! A fixed set of ten physical constants describing one configuration of the
//! sill/basin system. All values are in SI units (metres, seconds, pascals).
//! Nothing is validated when a value is set; pathological values show up
//! later as clamped or nonphysical rates.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{GibraltarError, GibraltarResult};
use crate::units::{MM_PER_YEAR, YEAR_SECONDS};

/// Description of one parameter field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterInfo {
    /// Field name
    pub name: &'static str,
    /// Conventional symbol, also accepted by [`Parameters::get`] and [`Parameters::set`]
    pub symbol: &'static str,
    /// Reference value
    pub default: f64,
    pub unit: &'static str,
    pub description: &'static str,
}

/// All parameters, in declaration order.
pub const PARAMETER_TABLE: [ParameterInfo; 10] = [
    ParameterInfo {
        name: "erodability",
        symbol: "kb",
        default: 8e-6 / YEAR_SECONDS,
        unit: "m/s/Pa^a",
        description: "Erodability constant of the sill",
    },
    ParameterInfo {
        name: "critical_shear_stress",
        symbol: "tauc",
        default: 50.0,
        unit: "Pa",
        description: "Shear stress below which no erosion occurs",
    },
    ParameterInfo {
        name: "width_coefficient",
        symbol: "Cw",
        default: 6.0,
        unit: "-",
        description: "Coefficient of the Turowski channel width formula",
    },
    ParameterInfo {
        name: "uplift_rate",
        symbol: "U",
        default: 4.9 / MM_PER_YEAR,
        unit: "m/s",
        description: "Tectonic uplift rate of the sill",
    },
    ParameterInfo {
        name: "erosion_exponent",
        symbol: "a",
        default: 1.5,
        unit: "-",
        description: "Exponent applied to the excess shear stress",
    },
    ParameterInfo {
        name: "stream_length",
        symbol: "L",
        default: 100e3,
        unit: "m",
        description: "Channel length used for the slope",
    },
    ParameterInfo {
        name: "roughness",
        symbol: "n",
        default: 0.05,
        unit: "s/m^(1/3)",
        description: "Manning roughness coefficient of the channel",
    },
    ParameterInfo {
        name: "precipitation",
        symbol: "P",
        default: 0.6 / YEAR_SECONDS,
        unit: "m/s",
        description: "Precipitation rate over the basin",
    },
    ParameterInfo {
        name: "evaporation",
        symbol: "E",
        default: 1.2 / YEAR_SECONDS,
        unit: "m/s",
        description: "Evaporation rate over the basin",
    },
    ParameterInfo {
        name: "river_discharge",
        symbol: "R",
        default: 4500.0 + 12000.0,
        unit: "m^3/s",
        description: "River input to the basin, excluding flow over the sill",
    },
];

/// Parameters of the sill/basin model.
///
/// Each integration run owns its own copy; the struct is `Copy` so sweeps can
/// derive variants with [`Parameters::with`] without aliasing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    /// Erodability constant, $k_b$
    /// unit: m/s/Pa^a
    pub erodability: f64,
    /// Critical shear stress, $\tau_c$
    /// unit: Pa
    pub critical_shear_stress: f64,
    /// Turowski channel width coefficient, $C_w$
    pub width_coefficient: f64,
    /// Sill uplift rate, $U$
    /// unit: m/s
    pub uplift_rate: f64,
    /// Erosion exponent, $a$
    pub erosion_exponent: f64,
    /// Stream length, $L$
    /// unit: m
    pub stream_length: f64,
    /// Roughness coefficient, $n$
    /// unit: s/m^(1/3)
    pub roughness: f64,
    /// Precipitation rate, $P$
    /// unit: m/s
    pub precipitation: f64,
    /// Evaporation rate, $E$
    /// unit: m/s
    pub evaporation: f64,
    /// River discharge into the basin, $R$
    /// unit: m^3/s
    pub river_discharge: f64,
}

impl Default for Parameters {
    fn default() -> Self {
        let mut parameters = Self {
            erodability: 0.0,
            critical_shear_stress: 0.0,
            width_coefficient: 0.0,
            uplift_rate: 0.0,
            erosion_exponent: 0.0,
            stream_length: 0.0,
            roughness: 0.0,
            precipitation: 0.0,
            evaporation: 0.0,
            river_discharge: 0.0,
        };
        for (index, info) in PARAMETER_TABLE.iter().enumerate() {
            *parameters.slot_mut(index) = info.default;
        }
        parameters
    }
}

impl Parameters {
    /// Parse parameters from a TOML table. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> GibraltarResult<Self> {
        toml::from_str(source).map_err(|e| GibraltarError::Config(e.to_string()))
    }

    /// Looks up a value by field name or symbol.
    pub fn get(&self, name: &str) -> GibraltarResult<f64> {
        let index = Self::index_of(name)?;
        Ok(self.slot(index))
    }

    /// Sets a value by field name or symbol.
    pub fn set(&mut self, name: &str, value: f64) -> GibraltarResult<()> {
        let index = Self::index_of(name)?;
        *self.slot_mut(index) = value;
        Ok(())
    }

    /// Returns a copy with one value replaced.
    pub fn with(mut self, name: &str, value: f64) -> GibraltarResult<Self> {
        self.set(name, value)?;
        Ok(self)
    }

    /// `(name, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        PARAMETER_TABLE
            .iter()
            .enumerate()
            .map(move |(index, info)| (info.name, self.slot(index)))
    }

    /// Metadata for a name or symbol.
    pub fn info(name: &str) -> GibraltarResult<&'static ParameterInfo> {
        Self::index_of(name).map(|index| &PARAMETER_TABLE[index])
    }

    fn index_of(name: &str) -> GibraltarResult<usize> {
        PARAMETER_TABLE
            .iter()
            .position(|info| info.name == name || info.symbol == name)
            .ok_or_else(|| GibraltarError::UnknownParameter(name.to_string()))
    }

    fn slot(&self, index: usize) -> f64 {
        match index {
            0 => self.erodability,
            1 => self.critical_shear_stress,
            2 => self.width_coefficient,
            3 => self.uplift_rate,
            4 => self.erosion_exponent,
            5 => self.stream_length,
            6 => self.roughness,
            7 => self.precipitation,
            8 => self.evaporation,
            9 => self.river_discharge,
            _ => unreachable!("parameter index out of range: {}", index),
        }
    }

    fn slot_mut(&mut self, index: usize) -> &mut f64 {
        match index {
            0 => &mut self.erodability,
            1 => &mut self.critical_shear_stress,
            2 => &mut self.width_coefficient,
            3 => &mut self.uplift_rate,
            4 => &mut self.erosion_exponent,
            5 => &mut self.stream_length,
            6 => &mut self.roughness,
            7 => &mut self.precipitation,
            8 => &mut self.evaporation,
            9 => &mut self.river_discharge,
            _ => unreachable!("parameter index out of range: {}", index),
        }
    }
}

impl fmt::Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{} = {}", name, format_general(value))?;
        }
        Ok(())
    }
}

/// Formats a number the way C's `%g` does: six significant digits, switching
/// to exponent notation for very small or very large magnitudes.
pub(crate) fn format_general(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{}", value);
    }
    let exponent = value.abs().log10().floor() as i32;
    if !(-5..6).contains(&exponent) {
        let formatted = format!("{:.5e}", value);
        match formatted.split_once('e') {
            Some((mantissa, exp)) => {
                let mantissa = trim_fraction(mantissa);
                let exp: i32 = exp.parse().unwrap_or(exponent);
                format!("{}e{}{:02}", mantissa, if exp < 0 { '-' } else { '+' }, exp.abs())
            }
            None => formatted,
        }
    } else {
        let decimals = (5 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_parameters() {
        let p = Parameters::default();
        assert_relative_eq!(p.erodability, 8e-6 / 31_557_600.0);
        assert_relative_eq!(p.critical_shear_stress, 50.0);
        assert_relative_eq!(p.width_coefficient, 6.0);
        assert_relative_eq!(p.uplift_rate, 4.9 / 31_557_600_000.0);
        assert_relative_eq!(p.erosion_exponent, 1.5);
        assert_relative_eq!(p.stream_length, 100e3);
        assert_relative_eq!(p.roughness, 0.05);
        assert_relative_eq!(p.precipitation, 0.6 / 31_557_600.0);
        assert_relative_eq!(p.evaporation, 1.2 / 31_557_600.0);
        assert_relative_eq!(p.river_discharge, 16500.0);
    }

    #[test]
    fn test_get_and_set_by_name_or_symbol() {
        let mut p = Parameters::default();
        p.set("tauc", 120.0).unwrap();
        assert_eq!(p.critical_shear_stress, 120.0);
        assert_eq!(p.get("critical_shear_stress").unwrap(), 120.0);

        p.set("erosion_exponent", 2.0).unwrap();
        assert_eq!(p.get("a").unwrap(), 2.0);
    }

    #[test]
    fn test_unknown_parameter() {
        let mut p = Parameters::default();
        assert!(matches!(
            p.set("viscosity", 1.0),
            Err(GibraltarError::UnknownParameter(name)) if name == "viscosity"
        ));
        assert!(p.get("").is_err());
    }

    #[test]
    fn test_info_by_name_or_symbol() {
        let by_name = Parameters::info("critical_shear_stress").unwrap();
        let by_symbol = Parameters::info("tauc").unwrap();
        assert_eq!(by_name, by_symbol);
        assert_eq!(by_name.symbol, "tauc");
        assert_eq!(by_name.default, 50.0);
        assert!(matches!(
            Parameters::info("salinity"),
            Err(GibraltarError::UnknownParameter(_))
        ));
    }

    #[test]
    fn test_no_validation_on_set() {
        let p = Parameters::default().with("kb", -1.0).unwrap();
        assert_eq!(p.erodability, -1.0);
    }

    #[test]
    fn test_with_leaves_original_untouched() {
        let base = Parameters::default();
        let varied = base.with("L", 50e3).unwrap();
        assert_eq!(base.stream_length, 100e3);
        assert_eq!(varied.stream_length, 50e3);
    }

    #[test]
    fn test_dump_order_and_format() {
        let dump = Parameters::default().to_string();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[0], "erodability = 2.53505e-13");
        assert_eq!(lines[1], "critical_shear_stress = 50");
        assert_eq!(lines[4], "erosion_exponent = 1.5");
        assert_eq!(lines[5], "stream_length = 100000");
        assert_eq!(lines[9], "river_discharge = 16500");
        for (line, info) in lines.iter().zip(PARAMETER_TABLE.iter()) {
            assert!(line.starts_with(info.name));
        }
    }

    #[test]
    fn test_format_general() {
        assert_eq!(format_general(0.05), "0.05");
        assert_eq!(format_general(123456.0), "123456");
        assert_eq!(format_general(1234567.0), "1.23457e+06");
        assert_eq!(format_general(1.9e-8), "1.9e-08");
        assert_eq!(format_general(-60.0), "-60");
    }

    #[test]
    fn test_from_toml_overrides_subset() {
        let source = "critical_shear_stress = 120.0\nwidth_coefficient = 2.0\n";
        let p = Parameters::from_toml_str(source).unwrap();
        assert_eq!(p.critical_shear_stress, 120.0);
        assert_eq!(p.width_coefficient, 2.0);
        assert_eq!(p.stream_length, Parameters::default().stream_length);
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        assert!(matches!(
            Parameters::from_toml_str("critical_shear_stress = \"high\""),
            Err(GibraltarError::Config(_))
        ));
    }
}
