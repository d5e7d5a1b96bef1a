//! fitsweep - parallel parameter sweep over an external fitting program
//!
//! Each parameter of a fitting template is tested as an extra free variable
//! in its own run of the fitting program. Runs are spread over a fixed pool
//! of workers, their output is watched line by line, and fits that diverge
//! are killed early.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): candidates, metrics, template parsing, ports
//! - **Application Layer** (`application`): stream monitor, candidate runner,
//!   pool orchestrator
//! - **Adapters** (`adapters`): the child-process launcher and a scripted
//!   stand-in for tests
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use fitsweep::adapters::process::ProgramLauncher;
//! use fitsweep::application::{RunnerSettings, StreamMonitor, SweepOrchestrator};
//! use fitsweep::domain::models::{CandidateFilter, Config, Template};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::default();
//! let template = Template::load("molecule.inp").await?;
//! let candidates = template.candidates(&CandidateFilter::MaxOrder(2))?;
//!
//! let orchestrator = SweepOrchestrator::new(
//!     RunnerSettings::from_config(std::env::current_dir()?, &config),
//!     Arc::new(ProgramLauncher::new(config.program.as_str())?),
//!     StreamMonitor::new(config.monitor.clone()),
//! );
//! let report = orchestrator
//!     .run(Arc::new(template), candidates, 4, CancellationToken::new())
//!     .await?;
//! for record in report.ranked() {
//!     println!("{record}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use application::{StreamMonitor, SweepOrchestrator, SweepReport};
pub use domain::models::{Candidate, Config, MetricPair, MetricValue, ResultRecord, StopReason, Template};
pub use domain::{SweepError, TemplateError};
pub use infrastructure::config::{ConfigError, ConfigLoader};
