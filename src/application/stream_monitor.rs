//! Output Stream Monitor
//!
//! Reads the stdout of one fitting run line by line, keeps the residual
//! history, and stops the run as soon as it is clear the fit is lost:
//!
//! ```text
//!   line ──► classify ──► NaN anywhere ─────────────► stop (numeric failure)
//!                   ├──► residual line ─────────────► history (until converged)
//!                   ├──► convergence line ──────────► stop collecting
//!                   ├──► iteration boundary ────────► bad count = 0
//!                   ├──► coefficient excluded ──────► bad count += 1, stop if > limit
//!                   └──► gradient row with NaN ─────► stop (numeric failure)
//! ```
//!
//! Every line is also copied to the candidate's `.out` artifact so a good fit
//! never has to be re-run to inspect its output. [`StreamMonitor::rescore`]
//! reads such an artifact back: it stops at convergence or on too many bad
//! iterations, never on NaN, and finalizes the same way.

use std::io;
use std::path::Path;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::models::{MetricPair, MonitorConfig, StopReason};
use crate::domain::ports::{FitProcess, LaunchedFit};

/// How long a stopped process gets to exit before it is killed.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(10);

/// Classification of one output line, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    NumericFailure,
    WeightedResidual,
    UnweightedResidual,
    Converged,
    IterationBoundary,
    BadCoefficient,
    GradientNaN,
    Other,
}

impl LineClass {
    /// Classify a line of a live run, terminator included if it had one.
    /// First match wins.
    pub fn of(line: &str, config: &MonitorConfig) -> Self {
        if line.contains(config.nan_marker.as_str()) {
            return Self::NumericFailure;
        }
        match Self::of_saved(line, config) {
            Self::Other if is_gradient_nan(line, config) => Self::GradientNaN,
            class => class,
        }
    }

    /// Classify a line of a saved artifact. Only the prefix markers apply.
    pub fn of_saved(line: &str, config: &MonitorConfig) -> Self {
        if line.starts_with(config.weighted_marker.as_str()) {
            Self::WeightedResidual
        } else if line.starts_with(config.unweighted_marker.as_str()) {
            Self::UnweightedResidual
        } else if line.starts_with(config.converged_marker.as_str()) {
            Self::Converged
        } else if line.starts_with(config.iteration_marker.as_str()) {
            Self::IterationBoundary
        } else if line.starts_with(config.bad_coefficient_marker.as_str()) {
            Self::BadCoefficient
        } else {
            Self::Other
        }
    }
}

/// Gradient dump rows are long, start with a space and carry a NaN in a
/// fixed field when a derivative blew up.
///
/// The length counts characters plus one for the line terminator, so an
/// unterminated final row must be one character longer to qualify.
fn is_gradient_nan(line: &str, config: &MonitorConfig) -> bool {
    let text = strip_terminator(line);
    let length = text.chars().count() + usize::from(line.ends_with('\n'));
    length > config.gradient_min_len
        && text.starts_with(' ')
        && text.split_whitespace().nth(config.gradient_nan_field) == Some(config.nan_marker.as_str())
}

fn strip_terminator(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

/// Mutable state of one stream-consumption session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorState {
    weighted_history: Vec<String>,
    unweighted_history: Vec<String>,
    consecutive_bad_iterations: u64,
    converged: bool,
}

impl MonitorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line of a live run. Returns the reason to stop the process,
    /// if any.
    pub fn observe(&mut self, line: &str, config: &MonitorConfig) -> Option<StopReason> {
        match LineClass::of(line, config) {
            LineClass::NumericFailure | LineClass::GradientNaN => {
                return Some(StopReason::NumericFailure);
            }
            // after convergence the program reprints residuals while
            // finishing up; those lines are noise
            LineClass::WeightedResidual => {
                if !self.converged {
                    self.weighted_history.push(strip_terminator(line).to_string());
                }
            }
            LineClass::UnweightedResidual => {
                if !self.converged {
                    self.unweighted_history.push(strip_terminator(line).to_string());
                }
            }
            LineClass::Converged => self.converged = true,
            LineClass::IterationBoundary => self.consecutive_bad_iterations = 0,
            LineClass::BadCoefficient => return self.count_bad_coefficient(config),
            LineClass::Other => {}
        }
        None
    }

    /// Feed one line of a saved artifact. Returns the reason to stop
    /// reading, if any. NaN lines are read like any other.
    pub fn observe_saved(&mut self, line: &str, config: &MonitorConfig) -> Option<StopReason> {
        match LineClass::of_saved(line, config) {
            LineClass::WeightedResidual => self.weighted_history.push(strip_terminator(line).to_string()),
            LineClass::UnweightedResidual => self.unweighted_history.push(strip_terminator(line).to_string()),
            LineClass::Converged => {
                self.converged = true;
                return Some(StopReason::Converged);
            }
            LineClass::IterationBoundary => self.consecutive_bad_iterations = 0,
            LineClass::BadCoefficient => return self.count_bad_coefficient(config),
            _ => {}
        }
        None
    }

    fn count_bad_coefficient(&mut self, config: &MonitorConfig) -> Option<StopReason> {
        self.consecutive_bad_iterations += 1;
        (self.consecutive_bad_iterations > config.max_bad_iterations).then_some(StopReason::ExcessiveBadIterations)
    }

    /// Best available metrics. Never fails; missing history becomes NaN.
    pub fn finalize(&self) -> MetricPair {
        MetricPair::from_histories(&self.weighted_history, &self.unweighted_history)
    }

    pub fn weighted_history(&self) -> &[String] {
        &self.weighted_history
    }

    pub fn unweighted_history(&self) -> &[String] {
        &self.unweighted_history
    }

    pub const fn consecutive_bad_iterations(&self) -> u64 {
        self.consecutive_bad_iterations
    }

    pub const fn is_converged(&self) -> bool {
        self.converged
    }
}

/// Result of monitoring one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorOutcome {
    pub metrics: MetricPair,
    pub stop_reason: StopReason,
    pub lines_read: u64,
}

/// Best-effort copy of the stream to disk.
///
/// The first failure is logged and disables the sink; metric extraction
/// carries on regardless.
struct ArtifactSink {
    writer: Option<BufWriter<File>>,
}

impl ArtifactSink {
    async fn open(path: Option<&Path>) -> Self {
        let writer = match path {
            None => None,
            Some(path) => match File::create(path).await {
                Ok(file) => Some(BufWriter::new(file)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot create output artifact");
                    None
                }
            },
        };
        Self { writer }
    }

    async fn write(&mut self, bytes: &[u8]) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.write_all(bytes).await {
                warn!(error = %e, "output artifact write failed, no longer persisting");
                self.writer = None;
            }
        }
    }

    async fn finish(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush().await {
                warn!(error = %e, "output artifact flush failed");
            }
        }
    }
}

/// Drives one fitting run to completion or early termination.
#[derive(Debug, Clone)]
pub struct StreamMonitor {
    config: MonitorConfig,
    stop_grace: Duration,
}

impl StreamMonitor {
    pub const fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }

    #[must_use]
    pub const fn with_stop_grace(mut self, stop_grace: Duration) -> Self {
        self.stop_grace = stop_grace;
        self
    }

    pub const fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Consume `fit`'s output until it ends, a stop condition fires, or
    /// `cancel` is triggered.
    ///
    /// The process has always exited (or been killed and reaped) when this
    /// returns. When `artifact` is set, every line read is copied there.
    pub async fn monitor(
        &self,
        fit: LaunchedFit,
        label: &str,
        artifact: Option<&Path>,
        cancel: &CancellationToken,
    ) -> MonitorOutcome {
        let LaunchedFit {
            output: mut reader,
            mut process,
        } = fit;
        let mut sink = ArtifactSink::open(artifact).await;
        let mut state = MonitorState::new();
        let mut lines_read = 0u64;
        let mut buf = Vec::with_capacity(256);

        let forced = loop {
            buf.clear();
            let read = tokio::select! {
                biased;
                () = cancel.cancelled() => break Some(StopReason::Cancelled),
                read = reader.read_until(b'\n', &mut buf) => read,
            };
            match read {
                Ok(0) => break None,
                Ok(_) => {}
                Err(e) => {
                    warn!(candidate = label, error = %e, "reading fit output failed");
                    break None;
                }
            }
            lines_read += 1;
            sink.write(&buf).await;

            let line = String::from_utf8_lossy(&buf);
            if let Some(reason) = state.observe(&line, &self.config) {
                debug!(candidate = label, line = strip_terminator(&line), "stop condition matched");
                break Some(reason);
            }
        };

        // release the pipe first so a process blocked on a full pipe can exit
        drop(reader);
        sink.finish().await;

        let stop_reason = match forced {
            Some(reason) => {
                info!(
                    candidate = label,
                    reason = %reason,
                    bad_iterations = state.consecutive_bad_iterations(),
                    "terminating fit"
                );
                self.terminate(process.as_mut(), label).await;
                reason
            }
            None => {
                if self.reap(process.as_mut(), label, cancel).await {
                    StopReason::Cancelled
                } else if state.is_converged() {
                    StopReason::Converged
                } else {
                    StopReason::StreamEnded
                }
            }
        };

        MonitorOutcome {
            metrics: state.finalize(),
            stop_reason,
            lines_read,
        }
    }

    /// Signal the process and wait for it, killing it if it lingers.
    async fn terminate(&self, process: &mut dyn FitProcess, label: &str) {
        if !matches!(process.has_exited(), Ok(true)) {
            if let Err(e) = process.request_stop() {
                warn!(candidate = label, error = %e, "failed to signal fit");
            }
        }
        self.wait_or_kill(process, label).await;
    }

    /// The stream closed on its own: give the process time to finish
    /// writing its files before stopping it.
    ///
    /// Returns true when `cancel` fired first. The run is then stopped and
    /// its output must not be trusted.
    async fn reap(&self, process: &mut dyn FitProcess, label: &str, cancel: &CancellationToken) -> bool {
        let waited = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            waited = tokio::time::timeout(self.stop_grace, process.wait()) => Some(waited),
        };
        match waited {
            Some(Ok(Ok(code))) => debug!(candidate = label, ?code, "fit exited"),
            Some(Ok(Err(e))) => warn!(candidate = label, error = %e, "error waiting for fit"),
            Some(Err(_)) => {
                warn!(candidate = label, "fit closed its output but kept running");
                self.terminate(process, label).await;
            }
            None => {
                info!(candidate = label, "cancelled while waiting for fit to exit");
                self.terminate(process, label).await;
                return true;
            }
        }
        false
    }

    /// Recover the metrics of a finished run from its saved artifact,
    /// without running anything.
    pub async fn rescore(&self, path: &Path) -> io::Result<MonitorOutcome> {
        let mut reader = BufReader::new(File::open(path).await?);
        let mut state = MonitorState::new();
        let mut lines_read = 0u64;
        let mut buf = Vec::with_capacity(256);

        let stopped = loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break None;
            }
            lines_read += 1;
            if let Some(reason) = state.observe_saved(&String::from_utf8_lossy(&buf), &self.config) {
                break Some(reason);
            }
        };

        debug!(path = %path.display(), lines_read, "rescored saved output");
        Ok(MonitorOutcome {
            metrics: state.finalize(),
            stop_reason: stopped.unwrap_or(StopReason::StreamEnded),
            lines_read,
        })
    }

    async fn wait_or_kill(&self, process: &mut dyn FitProcess, label: &str) {
        match tokio::time::timeout(self.stop_grace, process.wait()).await {
            Ok(Ok(code)) => debug!(candidate = label, ?code, "fit stopped"),
            Ok(Err(e)) => warn!(candidate = label, error = %e, "error waiting for fit"),
            Err(_) => {
                warn!(candidate = label, "fit ignored stop request, killing");
                if let Err(e) = process.kill() {
                    warn!(candidate = label, error = %e, "failed to kill fit");
                }
                if let Err(e) = process.wait().await {
                    warn!(candidate = label, error = %e, "error waiting for killed fit");
                }
            }
        }
    }
}
