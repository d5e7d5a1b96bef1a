pub mod candidate;
pub mod config;
pub mod metrics;
pub mod template;

pub use candidate::{Candidate, WorkerSlot, ARTIFACT_SUFFIX, BASELINE_LABEL};
pub use config::{Config, LogFormat, LoggingConfig, MonitorConfig};
pub use metrics::{MetricPair, MetricValue, ResultRecord, StopReason, NAN_MARKER};
pub use template::{CandidateFilter, ParameterRow, Template};
