//! Domain errors for the fitsweep system.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that escape a candidate or the sweep as a whole.
///
/// Per-candidate failures (launch failures, numeric divergence, empty
/// residual history) never show up here: they are folded into the
/// candidate's [`ResultRecord`](crate::domain::models::ResultRecord) as NaN
/// metrics. Only cancellation leaves a runner, and only orchestrator-level
/// problems leave the orchestrator.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Sweep cancelled")]
    Cancelled,

    #[error("Failed to create results directory {path}: {source}")]
    ResultsDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to prepare worker directory {path}: {source}")]
    WorkerDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid concurrency: {0}. Must be at least 1")]
    InvalidConcurrency(usize),

    #[error("Worker {slot} failed: {reason}")]
    WorkerFailed { slot: usize, reason: String },
}

pub type SweepResult<T> = Result<T, SweepError>;

/// Errors raised while reading the template's parameter table.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Failed to read template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Line {line}: expected at least {expected} comma-separated fields, found {found}")]
    MissingField {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("Line {line}: free/fixed flag {value:?} is not an integer")]
    InvalidFlag { line: usize, value: String },

    #[error("Line {line}: order digit {value:?} is not an integer")]
    InvalidOrderDigit { line: usize, value: String },
}
