use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Main configuration structure for fitsweep
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Path or name of the fitting program executable
    #[serde(default = "default_program")]
    pub program: String,

    /// Number of concurrent workers (1-256)
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Name of the input file written into each worker directory
    #[serde(default = "default_input_file_name")]
    pub input_file_name: String,

    /// Prefix of the per-worker scratch directories
    #[serde(default = "default_worker_dir_prefix")]
    pub worker_dir_prefix: String,

    /// Shared directory collecting the `.out` artifacts
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    /// Fix the other free parameters sharing a candidate's parent name
    #[serde(default)]
    pub fix_others: bool,

    /// Score a candidate from its saved `.out` in the results directory
    /// instead of running the program again
    #[serde(default)]
    pub reuse_outputs: bool,

    /// Output stream monitoring
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_program() -> String {
    "ram36_vt4n.exe".to_string()
}

const fn default_max_workers() -> usize {
    2
}

fn default_input_file_name() -> String {
    "input.txt".to_string()
}

fn default_worker_dir_prefix() -> String {
    ".fitsweep_worker_".to_string()
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("outputs")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            program: default_program(),
            max_workers: default_max_workers(),
            input_file_name: default_input_file_name(),
            worker_dir_prefix: default_worker_dir_prefix(),
            results_dir: default_results_dir(),
            fix_others: false,
            reuse_outputs: false,
            monitor: MonitorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Progress-line vocabulary of the fitting program and termination limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MonitorConfig {
    /// Prefix of a weighted residual line
    #[serde(default = "default_weighted_marker")]
    pub weighted_marker: String,

    /// Prefix of an unweighted residual line
    #[serde(default = "default_unweighted_marker")]
    pub unweighted_marker: String,

    /// Prefix of the line printed once the fit has converged
    #[serde(default = "default_converged_marker")]
    pub converged_marker: String,

    /// Prefix of an iteration boundary line
    #[serde(default = "default_iteration_marker")]
    pub iteration_marker: String,

    /// Prefix of a low-order coefficient exclusion line
    #[serde(default = "default_bad_coefficient_marker")]
    pub bad_coefficient_marker: String,

    /// Substring signalling numeric failure
    #[serde(default = "default_nan_marker")]
    pub nan_marker: String,

    /// Consecutive exclusions tolerated before the fit is killed
    #[serde(default = "default_max_bad_iterations")]
    pub max_bad_iterations: u64,

    /// Lines longer than this (starting with a space) are gradient dump rows
    #[serde(default = "default_gradient_min_len")]
    pub gradient_min_len: usize,

    /// Whitespace-separated field of a gradient row checked for NaN
    #[serde(default = "default_gradient_nan_field")]
    pub gradient_nan_field: usize,
}

fn default_weighted_marker() -> String {
    " wrms".to_string()
}

fn default_unweighted_marker() -> String {
    " rms_MHz".to_string()
}

fn default_converged_marker() -> String {
    "rmscat_MHz".to_string()
}

fn default_iteration_marker() -> String {
    " iteration number ".to_string()
}

fn default_bad_coefficient_marker() -> String {
    " the lowest vt coeff included for".to_string()
}

fn default_nan_marker() -> String {
    "NaN".to_string()
}

const fn default_max_bad_iterations() -> u64 {
    99_999
}

const fn default_gradient_min_len() -> usize {
    110
}

const fn default_gradient_nan_field() -> usize {
    8
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            weighted_marker: default_weighted_marker(),
            unweighted_marker: default_unweighted_marker(),
            converged_marker: default_converged_marker(),
            iteration_marker: default_iteration_marker(),
            bad_coefficient_marker: default_bad_coefficient_marker(),
            nan_marker: default_nan_marker(),
            max_bad_iterations: default_max_bad_iterations(),
            gradient_min_len: default_gradient_min_len(),
            gradient_nan_field: default_gradient_nan_field(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format for stderr output
    #[serde(default)]
    pub format: LogFormat,

    /// Directory for JSON log files (daily rotation); stderr only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_dir: None,
        }
    }
}
