use thiserror::Error;

use crate::trajectory::StopReason;

/// Error type for invalid operations.
#[derive(Error, Debug)]
pub enum GibraltarError {
    #[error("Unknown parameter '{0}'")]
    UnknownParameter(String),
    #[error("Invalid integration options: {0}")]
    InvalidOptions(String),
    #[error("Integration stopped at t={time} s before reaching the end time: {reason}")]
    IntegrationStopped { time: f64, reason: StopReason },
    #[error("Could not read configuration: {0}")]
    Config(String),
}

/// Convenience type for `Result<T, GibraltarError>`.
pub type GibraltarResult<T> = Result<T, GibraltarError>;
