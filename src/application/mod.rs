//! Application layer: monitoring one fit, running one candidate and
//! orchestrating the whole sweep.

pub mod candidate_runner;
pub mod stream_monitor;
pub mod sweep_orchestrator;

pub use candidate_runner::{CandidateRunner, RunnerSettings};
pub use stream_monitor::{LineClass, MonitorOutcome, MonitorState, StreamMonitor, DEFAULT_STOP_GRACE};
pub use sweep_orchestrator::{SweepEvent, SweepOrchestrator, SweepReport, MAX_CONCURRENCY};
