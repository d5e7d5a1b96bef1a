//! Pool Orchestrator
//!
//! Runs every candidate of a sweep across a fixed pool of worker slots.
//!
//! ```text
//!            ┌──────────── candidate queue ────────────┐
//!            │  baseline, P1, P2, ...                  │
//!            └─────┬───────────┬───────────┬───────────┘
//!                  ▼           ▼           ▼
//!              slot 0      slot 1   ...  slot N-1      (one CandidateRunner each)
//!                  │           │           │
//!                  └─────┬─────┴───────────┘
//!                        ▼
//!        SweepEvent channel (live) + records (completion order)
//! ```
//!
//! Each slot pulls the next candidate when idle, so a slow fit never holds
//! up the others. Cancellation stops dispatch, terminates in-flight fits and
//! still returns what was already collected.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::candidate_runner::{CandidateRunner, RunnerSettings};
use crate::application::stream_monitor::StreamMonitor;
use crate::domain::errors::{SweepError, SweepResult};
use crate::domain::models::{Candidate, ResultRecord, Template, WorkerSlot};
use crate::domain::ports::FitLauncher;

/// Upper bound on the worker pool.
pub const MAX_CONCURRENCY: usize = 256;

/// Progress notifications streamed while the sweep runs.
#[derive(Debug, Clone)]
pub enum SweepEvent {
    /// A slot picked up a candidate.
    Started { slot: WorkerSlot, candidate: Candidate },
    /// A candidate produced its record.
    Finished { slot: WorkerSlot, record: ResultRecord },
}

/// Everything a sweep produced.
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    /// Records in completion order.
    pub records: Vec<ResultRecord>,
    /// Whether the sweep was cancelled before every candidate ran.
    pub cancelled: bool,
    /// Candidates handed to the sweep.
    pub total_candidates: usize,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl SweepReport {
    /// Records ranked by weighted residual, unusable scores last.
    pub fn ranked(&self) -> Vec<&ResultRecord> {
        let mut ranked: Vec<_> = self.records.iter().collect();
        ranked.sort_by(|a, b| a.cmp_by_weighted_residual(b));
        ranked
    }

    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.records.len() == self.total_candidates
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}

/// Dispatches candidates to a pool of [`CandidateRunner`]s.
pub struct SweepOrchestrator {
    settings: Arc<RunnerSettings>,
    launcher: Arc<dyn FitLauncher>,
    monitor: Arc<StreamMonitor>,
    events: Option<mpsc::UnboundedSender<SweepEvent>>,
}

impl SweepOrchestrator {
    pub fn new(
        settings: RunnerSettings,
        launcher: Arc<dyn FitLauncher>,
        monitor: StreamMonitor,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            launcher,
            monitor: Arc::new(monitor),
            events: None,
        }
    }

    /// Stream [`SweepEvent`]s to `tx` while the sweep runs.
    #[must_use]
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<SweepEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Run `candidates` with at most `concurrency` fits at a time.
    ///
    /// Per-candidate failures end up in the records. Errors are reserved
    /// for problems with the sweep itself: an unusable concurrency, a
    /// results directory that cannot be created, or a worker task that
    /// panicked. Worker directories are removed on every path.
    pub async fn run(
        &self,
        template: Arc<Template>,
        candidates: Vec<Candidate>,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> SweepResult<SweepReport> {
        if concurrency == 0 || concurrency > MAX_CONCURRENCY {
            return Err(SweepError::InvalidConcurrency(concurrency));
        }

        let results_dir = &self.settings.results_dir;
        tokio::fs::create_dir_all(results_dir)
            .await
            .map_err(|source| SweepError::ResultsDirectory {
                path: results_dir.clone(),
                source,
            })?;

        let started = Instant::now();
        let total_candidates = candidates.len();
        let slots = concurrency.min(total_candidates);
        info!(
            candidates = total_candidates,
            workers = slots,
            program = self.launcher.program(),
            "starting sweep"
        );

        let queue = Arc::new(Mutex::new(VecDeque::from(candidates)));
        let records = Arc::new(Mutex::new(Vec::with_capacity(total_candidates)));

        let handles: Vec<_> = (0..slots)
            .map(|index| {
                let runner = CandidateRunner::new(
                    WorkerSlot::new(index),
                    Arc::clone(&self.settings),
                    Arc::clone(&self.launcher),
                    Arc::clone(&self.monitor),
                );
                tokio::spawn(Self::worker(
                    runner,
                    Arc::clone(&template),
                    Arc::clone(&queue),
                    Arc::clone(&records),
                    self.events.clone(),
                    cancel.clone(),
                ))
            })
            .collect();

        let mut failure = None;
        for (index, joined) in join_all(handles).await.into_iter().enumerate() {
            if let Err(e) = joined {
                error!(slot = index, error = %e, "worker task failed");
                if failure.is_none() {
                    failure = Some(SweepError::WorkerFailed {
                        slot: index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        self.remove_worker_dirs(slots).await;

        if let Some(e) = failure {
            return Err(e);
        }

        let records = std::mem::take(&mut *records.lock().await);
        let report = SweepReport {
            cancelled: cancel.is_cancelled() && records.len() < total_candidates,
            records,
            total_candidates,
            elapsed: started.elapsed(),
        };
        info!(
            completed = report.records.len(),
            cancelled = report.cancelled,
            elapsed_secs = report.elapsed.as_secs_f64(),
            "sweep finished"
        );
        Ok(report)
    }

    async fn worker(
        runner: CandidateRunner,
        template: Arc<Template>,
        queue: Arc<Mutex<VecDeque<Candidate>>>,
        records: Arc<Mutex<Vec<ResultRecord>>>,
        events: Option<mpsc::UnboundedSender<SweepEvent>>,
        cancel: CancellationToken,
    ) {
        let slot = runner.slot();
        loop {
            if cancel.is_cancelled() {
                debug!(slot = slot.index(), "cancelled, not taking more candidates");
                break;
            }
            let Some(candidate) = queue.lock().await.pop_front() else {
                break;
            };

            if let Some(tx) = &events {
                let _ = tx.send(SweepEvent::Started {
                    slot,
                    candidate: candidate.clone(),
                });
            }

            match runner.run(&template, &candidate, &cancel).await {
                Ok(record) => {
                    if let Some(tx) = &events {
                        let _ = tx.send(SweepEvent::Finished {
                            slot,
                            record: record.clone(),
                        });
                    }
                    records.lock().await.push(record);
                }
                Err(SweepError::Cancelled) => {
                    debug!(slot = slot.index(), candidate = %candidate, "in-flight candidate cancelled");
                    break;
                }
                Err(e) => {
                    warn!(slot = slot.index(), candidate = %candidate, error = %e, "candidate failed");
                }
            }
        }
    }

    async fn remove_worker_dirs(&self, slots: usize) {
        for index in 0..slots {
            let dir = self.settings.worker_dir(WorkerSlot::new(index));
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => debug!(dir = %dir.display(), "removed worker directory"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(dir = %dir.display(), error = %e, "failed to remove worker directory"),
            }
        }
    }
}

impl std::fmt::Debug for SweepOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SweepOrchestrator")
            .field("settings", &self.settings)
            .field("program", &self.launcher.program())
            .finish_non_exhaustive()
    }
}
