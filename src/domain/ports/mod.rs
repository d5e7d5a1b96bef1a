//! Port trait definitions (Hexagonal Architecture)
//!
//! - `FitLauncher`: starts the external fitting program
//! - `FitProcess`: controls one running fit
//!
//! These traits let the monitor and the orchestrator run against scripted
//! streams in tests and against real child processes in production.

pub mod fit_program;

pub use fit_program::{FitLauncher, FitProcess, LaunchedFit, OutputStream};
