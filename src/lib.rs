//! Sill incision and basin filling model
//!
//! The model itself lives in [`gibraltar_core`]; this crate re-exports it and
//! provides the `gibraltar` command line tool.

pub use gibraltar_core::*;
