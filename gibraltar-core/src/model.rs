//! The coupled sill/basin system
//!
//! [`SillBasinModel`] pairs a parameter set with the hypsometry it is
//! evaluated against. It is a plain value: every run reads it and nothing
//! writes to it, so independent runs can live on separate threads.

use serde::{Deserialize, Serialize};

use crate::hypsometry::BasinHypsometry;
use crate::parameters::Parameters;
use crate::rates::{self, RateDiagnostics, State};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SillBasinModel {
    pub parameters: Parameters,
    pub hypsometry: BasinHypsometry,
}

impl SillBasinModel {
    /// Model over the Mediterranean hypsometry.
    pub fn new(parameters: Parameters) -> Self {
        Self {
            parameters,
            hypsometry: BasinHypsometry::default(),
        }
    }

    pub fn with_hypsometry(self, hypsometry: BasinHypsometry) -> Self {
        Self {
            parameters: self.parameters,
            hypsometry,
        }
    }

    pub fn sill_rate(&self, sill_level: f64, basin_level: f64) -> f64 {
        rates::sill_rate(&self.parameters, &self.hypsometry, sill_level, basin_level)
    }

    pub fn basin_rate(&self, sill_level: f64, basin_level: f64) -> f64 {
        rates::basin_rate(&self.parameters, &self.hypsometry, sill_level, basin_level)
    }

    pub fn channel_slope(&self, basin_level: f64) -> f64 {
        rates::channel_slope(&self.parameters, &self.hypsometry, basin_level)
    }

    pub fn ocean_level(&self, basin_level: f64) -> f64 {
        self.hypsometry.compensated_ocean_level(basin_level)
    }

    /// `[d sill / dt, d basin / dt]` at `y`.
    pub fn derivatives(&self, y: &State) -> State {
        rates::derivatives(&self.parameters, &self.hypsometry, y)
    }

    pub fn diagnostics(&self, sill_level: f64, basin_level: f64) -> RateDiagnostics {
        RateDiagnostics::evaluate(&self.parameters, &self.hypsometry, sill_level, basin_level)
    }
}

impl From<Parameters> for SillBasinModel {
    fn from(parameters: Parameters) -> Self {
        Self::new(parameters)
    }
}
