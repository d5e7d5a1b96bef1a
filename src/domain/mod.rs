//! Domain layer for fitsweep
//!
//! Candidates, metrics, the template's parameter table, configuration
//! models, errors and the ports to the external fitting program.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{SweepError, SweepResult, TemplateError};
