//! Infrastructure layer module
//!
//! Layered configuration loading (figment) and logging setup (tracing).

pub mod config;
pub mod logging;
