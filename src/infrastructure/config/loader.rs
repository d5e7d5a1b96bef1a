use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::{Config, MonitorConfig};

/// Project configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "fitsweep.yaml";

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "FITSWEEP_";

/// Largest accepted worker pool.
pub const MAX_WORKERS_LIMIT: usize = 256;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_workers: {0}. Must be between 1 and {MAX_WORKERS_LIMIT}")]
    InvalidMaxWorkers(usize),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Program cannot be empty")]
    EmptyProgram,

    #[error("Input file name must be a plain file name, got {0:?}")]
    InvalidInputFileName(String),

    #[error("Worker directory prefix must be a non-empty plain name, got {0:?}")]
    InvalidWorkerDirPrefix(String),

    #[error("Monitor marker {0} cannot be empty")]
    EmptyMarker(&'static str),

    #[error("Configuration file not found: {0}")]
    MissingFile(PathBuf),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. `path`, or `fitsweep.yaml` in the working directory when it exists
    /// 3. Environment variables (`FITSWEEP_*`, `__` separates nested keys)
    ///
    /// An explicit `path` must exist.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let file = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::MissingFile(path.to_path_buf()).into());
                }
                path.to_path_buf()
            }
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config: Config = Self::figment(&file)
            .extract()
            .with_context(|| format!("Failed to load configuration from {}", file.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment(file: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.max_workers == 0 || config.max_workers > MAX_WORKERS_LIMIT {
            return Err(ConfigError::InvalidMaxWorkers(config.max_workers));
        }

        if config.program.trim().is_empty() {
            return Err(ConfigError::EmptyProgram);
        }

        if !is_plain_name(&config.input_file_name) {
            return Err(ConfigError::InvalidInputFileName(
                config.input_file_name.clone(),
            ));
        }

        if !is_plain_name(&config.worker_dir_prefix) {
            return Err(ConfigError::InvalidWorkerDirPrefix(
                config.worker_dir_prefix.clone(),
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        Self::validate_monitor(&config.monitor)
    }

    fn validate_monitor(monitor: &MonitorConfig) -> Result<(), ConfigError> {
        let markers = [
            ("weighted_marker", &monitor.weighted_marker),
            ("unweighted_marker", &monitor.unweighted_marker),
            ("converged_marker", &monitor.converged_marker),
            ("iteration_marker", &monitor.iteration_marker),
            ("bad_coefficient_marker", &monitor.bad_coefficient_marker),
            ("nan_marker", &monitor.nan_marker),
        ];
        // an empty marker would match every line
        for (name, marker) in markers {
            if marker.is_empty() {
                return Err(ConfigError::EmptyMarker(name));
            }
        }
        Ok(())
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != ".."
}
