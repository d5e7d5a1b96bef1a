//! Candidate Runner
//!
//! Evaluates one candidate inside a worker slot's private directory: writes
//! the modified template, starts the fitting program, hands its output to the
//! [`StreamMonitor`] and turns the outcome into a [`ResultRecord`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::application::stream_monitor::StreamMonitor;
use crate::domain::errors::{SweepError, SweepResult};
use crate::domain::models::{Candidate, Config, MetricPair, ResultRecord, StopReason, Template, WorkerSlot};
use crate::domain::ports::FitLauncher;

/// Per-slot settings shared by every run in a sweep.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub root: PathBuf,
    pub results_dir: PathBuf,
    pub input_file_name: String,
    pub worker_dir_prefix: String,
    pub fix_others: bool,
    pub reuse_outputs: bool,
}

impl RunnerSettings {
    /// Settings rooted at `root`, taking file names and modes from `config`.
    ///
    /// A relative results directory is resolved against `root`.
    pub fn from_config(root: impl Into<PathBuf>, config: &Config) -> Self {
        let root = root.into();
        let results_dir = root.join(&config.results_dir);
        Self {
            root,
            results_dir,
            input_file_name: config.input_file_name.clone(),
            worker_dir_prefix: config.worker_dir_prefix.clone(),
            fix_others: config.fix_others,
            reuse_outputs: config.reuse_outputs,
        }
    }

    pub fn worker_dir(&self, slot: WorkerSlot) -> PathBuf {
        slot.directory(&self.root, &self.worker_dir_prefix)
    }
}

/// Runs candidates for one worker slot.
pub struct CandidateRunner {
    slot: WorkerSlot,
    settings: Arc<RunnerSettings>,
    launcher: Arc<dyn FitLauncher>,
    monitor: Arc<StreamMonitor>,
}

impl CandidateRunner {
    pub fn new(
        slot: WorkerSlot,
        settings: Arc<RunnerSettings>,
        launcher: Arc<dyn FitLauncher>,
        monitor: Arc<StreamMonitor>,
    ) -> Self {
        Self {
            slot,
            settings,
            launcher,
            monitor,
        }
    }

    pub const fn slot(&self) -> WorkerSlot {
        self.slot
    }

    pub fn worker_dir(&self) -> PathBuf {
        self.settings.worker_dir(self.slot)
    }

    /// Evaluate `candidate` against `template`.
    ///
    /// Launch and I/O failures are folded into the record as NaN metrics.
    /// The only error is [`SweepError::Cancelled`], in which case the
    /// candidate produced no record.
    #[instrument(skip_all, fields(slot = self.slot.index(), candidate = %candidate))]
    pub async fn run(
        &self,
        template: &Template,
        candidate: &Candidate,
        cancel: &CancellationToken,
    ) -> SweepResult<ResultRecord> {
        let started = Instant::now();

        if candidate.is_already_free() {
            debug!("parameter already free in the template, skipping");
            return Ok(self.finish(candidate, MetricPair::not_evaluated(), StopReason::Skipped, started));
        }
        if cancel.is_cancelled() {
            return Err(SweepError::Cancelled);
        }
        if let Some(record) = self.recover(candidate, started).await {
            return Ok(record);
        }

        let worker_dir = match self.prepare(template, candidate).await {
            Ok(dir) => dir,
            Err(e) => {
                warn!(error = %e, "could not prepare candidate input");
                return Ok(self.finish(candidate, MetricPair::nan(), StopReason::LaunchFailed, started));
            }
        };

        let fit = match self
            .launcher
            .launch(&worker_dir, &self.settings.input_file_name)
            .await
        {
            Ok(fit) => fit,
            Err(e) => {
                warn!(program = self.launcher.program(), error = %e, "failed to launch fit");
                return Ok(self.finish(candidate, MetricPair::nan(), StopReason::LaunchFailed, started));
            }
        };

        let artifact_name = candidate.artifact_name();
        let artifact = artifact_name.as_ref().map(|name| worker_dir.join(name));
        let outcome = self
            .monitor
            .monitor(fit, candidate.label(), artifact.as_deref(), cancel)
            .await;

        // an interrupted run may have ended its output early on its own
        if outcome.stop_reason == StopReason::Cancelled || cancel.is_cancelled() {
            return Err(SweepError::Cancelled);
        }

        if let (Some(name), Some(artifact)) = (artifact_name, artifact) {
            self.collect_artifact(&artifact, &name).await;
        }

        Ok(self.finish(candidate, outcome.metrics, outcome.stop_reason, started))
    }

    /// Score the candidate from its saved output when reuse is enabled and
    /// the file is there.
    async fn recover(&self, candidate: &Candidate, started: Instant) -> Option<ResultRecord> {
        if !self.settings.reuse_outputs {
            return None;
        }
        let saved = self.settings.results_dir.join(candidate.artifact_name()?);
        if !tokio::fs::try_exists(&saved).await.unwrap_or(false) {
            return None;
        }
        match self.monitor.rescore(&saved).await {
            Ok(outcome) => {
                debug!(path = %saved.display(), "recovered result from saved output");
                Some(self.finish(candidate, outcome.metrics, outcome.stop_reason, started))
            }
            Err(e) => {
                warn!(path = %saved.display(), error = %e, "cannot read saved output, running the fit");
                None
            }
        }
    }

    /// Create the slot directory and write the candidate's input file.
    async fn prepare(&self, template: &Template, candidate: &Candidate) -> SweepResult<PathBuf> {
        let worker_dir = self.worker_dir();
        tokio::fs::create_dir_all(&worker_dir)
            .await
            .map_err(|source| SweepError::WorkerDirectory {
                path: worker_dir.clone(),
                source,
            })?;

        let input = match candidate.identifier() {
            None => template.baseline_input(),
            Some(identifier) => template.candidate_input(identifier, self.settings.fix_others),
        };
        let input_path = worker_dir.join(&self.settings.input_file_name);
        tokio::fs::write(&input_path, input)
            .await
            .map_err(|source| SweepError::WorkerDirectory {
                path: input_path,
                source,
            })?;

        Ok(worker_dir)
    }

    /// Copy the candidate's output into the shared results directory.
    async fn collect_artifact(&self, artifact: &Path, name: &str) {
        if !artifact.exists() {
            return;
        }
        let target = self.settings.results_dir.join(name);
        if let Err(e) = tokio::fs::copy(artifact, &target).await {
            warn!(target = %target.display(), error = %e, "failed to collect output artifact");
        }
    }

    fn finish(
        &self,
        candidate: &Candidate,
        metrics: MetricPair,
        reason: StopReason,
        started: Instant,
    ) -> ResultRecord {
        let record = ResultRecord::new(candidate.clone(), metrics, reason, started.elapsed());
        info!(
            reason = %record.stop_reason,
            elapsed_secs = record.elapsed_secs,
            "{record}"
        );
        record
    }
}

impl std::fmt::Debug for CandidateRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandidateRunner")
            .field("slot", &self.slot)
            .field("program", &self.launcher.program())
            .finish_non_exhaustive()
    }
}
