//! Sill incision and basin filling model
//!
//! Two coupled ordinary differential equations describe a marginal sea
//! connected to the world ocean through a narrow channel over a sill: the
//! sill is uplifted tectonically and eroded by the flow over it, while the
//! basin level is set by evaporation, precipitation, rivers and that flow.
//!
//! The usual workflow is:
//!
//! 1. build a [`Parameters`] value (reference defaults via `Default`)
//! 2. change any fields of interest
//! 3. call [`integrate`] to obtain a [`Trajectory`]
//! 4. optionally [`SillBasinModel::classify`] the long-term regime
//!
//! ```no_run
//! use gibraltar_core::{integrate, IntegrationOptions, Parameters};
//!
//! let mut p = Parameters::default();
//! p.erosion_exponent = 1.75;
//! let trajectory = integrate(&p, &IntegrationOptions::default()).unwrap();
//! println!("final basin level: {:?}", trajectory.final_state());
//! ```
//!
//! Based on Garcia-Castellanos, D. & Villaseñor, A. (2011). Messinian
//! salinity crisis regulated by competing tectonics and erosion at the
//! Gibraltar arc. Nature 480, 359-363.

pub mod classify;
pub mod config;
pub mod errors;
pub mod fixed_point;
pub mod hypsometry;
pub mod integrate;
pub mod ivp;
pub mod model;
pub mod parameters;
pub mod rates;
pub mod rosenbrock;
pub mod trajectory;
pub mod units;

pub use classify::{Classification, ClassifyOptions, Regime};
pub use config::RunConfig;
pub use errors::{GibraltarError, GibraltarResult};
pub use hypsometry::BasinHypsometry;
pub use integrate::{integrate, IntegrationOptions};
pub use ivp::{Method, SolverSettings};
pub use model::SillBasinModel;
pub use parameters::{Parameters, PARAMETER_TABLE};
pub use rates::State;
pub use trajectory::{Outcome, SolverStats, StopReason, Trajectory};
