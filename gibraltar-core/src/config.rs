//! Run configuration
//!
//! A TOML file with optional `[parameters]`, `[hypsometry]`, `[integration]`
//! and `[classification]` tables. Anything left out keeps its reference value.
//!
//! ```toml
//! [parameters]
//! critical_shear_stress = 120.0
//! erosion_exponent = 2.0
//!
//! [integration]
//! integration_time_kyr = 250.0
//! method = "dopri5"
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::classify::ClassifyOptions;
use crate::errors::{GibraltarError, GibraltarResult};
use crate::hypsometry::BasinHypsometry;
use crate::integrate::IntegrationOptions;
use crate::model::SillBasinModel;
use crate::parameters::Parameters;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub parameters: Parameters,
    pub hypsometry: BasinHypsometry,
    pub integration: IntegrationOptions,
    pub classification: ClassifyOptions,
}

impl RunConfig {
    pub fn from_toml_str(source: &str) -> GibraltarResult<Self> {
        toml::from_str(source).map_err(|e| GibraltarError::Config(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> GibraltarResult<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)
            .map_err(|e| GibraltarError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }

    /// Applies a `name=value` override to the parameters.
    pub fn apply_override(&mut self, assignment: &str) -> GibraltarResult<()> {
        let (name, value) = assignment.split_once('=').ok_or_else(|| {
            GibraltarError::Config(format!("expected name=value, got '{}'", assignment))
        })?;
        let value: f64 = value.trim().parse().map_err(|_| {
            GibraltarError::Config(format!("'{}' is not a number", value.trim()))
        })?;
        self.parameters.set(name.trim(), value)
    }

    pub fn model(&self) -> SillBasinModel {
        SillBasinModel {
            parameters: self.parameters,
            hypsometry: self.hypsometry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ivp::Method;

    #[test]
    fn test_empty_config_is_reference() {
        let config = RunConfig::from_toml_str("").unwrap();
        assert_eq!(config, RunConfig::default());
    }

    #[test]
    fn test_partial_tables() {
        let config = RunConfig::from_toml_str(
            r#"
            [parameters]
            critical_shear_stress = 120.0

            [hypsometry]
            ocean_area = 3.0e14

            [integration]
            integration_time_kyr = 250.0
            method = "dop853"
            "#,
        )
        .unwrap();
        assert_eq!(config.parameters.critical_shear_stress, 120.0);
        assert_eq!(config.parameters.roughness, 0.05);
        assert_eq!(config.hypsometry.ocean_area, 3.0e14);
        assert_eq!(config.hypsometry.shelf_length, 127.5);
        assert_eq!(config.integration.integration_time_kyr, 250.0);
        assert_eq!(config.integration.method, Method::Dop853);
        assert_eq!(config.classification.interval_kyr, 25.0);
    }

    #[test]
    fn test_overrides() {
        let mut config = RunConfig::default();
        config.apply_override("tauc = 75").unwrap();
        config.apply_override("Cw=2").unwrap();
        assert_eq!(config.parameters.critical_shear_stress, 75.0);
        assert_eq!(config.parameters.width_coefficient, 2.0);

        assert!(config.apply_override("tauc").is_err());
        assert!(config.apply_override("tauc=abc").is_err());
        assert!(matches!(
            config.apply_override("depth=1"),
            Err(GibraltarError::UnknownParameter(_))
        ));
    }

    #[test]
    fn test_unknown_method_rejected() {
        assert!(RunConfig::from_toml_str("[integration]\nmethod = \"lsoda\"\n").is_err());
    }
}
