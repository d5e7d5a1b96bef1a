//! The sweep command: load everything, run the pool, print the report.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapters::process::ProgramLauncher;
use crate::application::{RunnerSettings, StreamMonitor, SweepEvent, SweepOrchestrator, SweepReport};
use crate::cli::output::progress::{banner, live_header, SweepProgress};
use crate::cli::output::table::{format_elapsed, ReportFormatter};
use crate::cli::types::Cli;
use crate::domain::models::{CandidateFilter, Config, Template};
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::logging::LoggerImpl;

/// Run a sweep as described by the command line.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let _logger = LoggerImpl::init(&config.logging).context("Failed to initialize logging")?;

    let template = Template::load(&cli.input)
        .await
        .with_context(|| format!("Failed to read template {}", cli.input.display()))?;
    let filter = candidate_filter(&cli);
    let candidates = template
        .candidates(&filter)
        .with_context(|| format!("Invalid parameter table in {}", cli.input.display()))?;
    if let CandidateFilter::Names(names) = &filter {
        // the baseline is always present
        if candidates.len() <= 1 {
            warn!(requested = ?names, "none of the requested parameters are in the template");
        }
    }

    let launcher = ProgramLauncher::new(config.program.as_str())
        .with_context(|| format!("Invalid program path {}", config.program))?;
    let root = std::env::current_dir().context("Failed to resolve working directory")?;
    let settings = RunnerSettings::from_config(root, &config);
    let (tx, rx) = mpsc::unbounded_channel();
    let orchestrator = SweepOrchestrator::new(
        settings,
        Arc::new(launcher),
        StreamMonitor::new(config.monitor.clone()),
    )
    .with_events(tx);

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let mut progress = if cli.json {
        SweepProgress::hidden(candidates.len())
    } else {
        SweepProgress::new(candidates.len())
    };
    progress.println(&banner(
        &cli.input.display().to_string(),
        &config.program,
        config.max_workers,
        candidates.len(),
    ));
    progress.println(&live_header());

    let printer = tokio::spawn(async move {
        print_events(rx, &mut progress).await;
        progress
    });

    let result = orchestrator
        .run(Arc::new(template), candidates, config.max_workers, cancel)
        .await;
    // closing the event channel lets the printer drain and finish
    drop(orchestrator);
    let progress = printer.await.context("Live output task failed")?;

    let report = result.context("Sweep failed")?;
    progress.finish(report.cancelled);
    print_report(&report, cli.json)?;
    Ok(())
}

/// Configuration with command-line overrides applied and re-validated.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = ConfigLoader::load(cli.config.as_deref())?;
    if let Some(workers) = cli.workers {
        config.max_workers = usize::from(workers);
    }
    if let Some(program) = &cli.program {
        config.program.clone_from(program);
    }
    if let Some(results_dir) = &cli.results_dir {
        config.results_dir.clone_from(results_dir);
    }
    if cli.fix {
        config.fix_others = true;
    }
    if cli.reuse_outputs {
        config.reuse_outputs = true;
    }
    ConfigLoader::validate(&config)?;
    Ok(config)
}

/// Names take precedence over the order limit.
pub fn candidate_filter(cli: &Cli) -> CandidateFilter {
    if !cli.params.is_empty() {
        CandidateFilter::Names(cli.params.clone())
    } else if let Some(order) = cli.order {
        CandidateFilter::MaxOrder(order)
    } else {
        CandidateFilter::All
    }
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("interrupt received, stopping running fits");
                cancel.cancel();
            }
            Err(e) => warn!(error = %e, "cannot listen for interrupts"),
        }
    });
}

async fn print_events(mut rx: mpsc::UnboundedReceiver<SweepEvent>, progress: &mut SweepProgress) {
    while let Some(event) = rx.recv().await {
        match event {
            SweepEvent::Started { slot, candidate } => progress.started(slot, &candidate),
            SweepEvent::Finished { slot, record } => progress.finished(slot, &record),
        }
    }
}

fn print_report(report: &SweepReport, json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
        println!("{out}");
        return Ok(());
    }

    println!();
    println!("{}", ReportFormatter::new().format_report(report));
    if report.cancelled {
        println!(
            "Sweep cancelled: {} of {} candidates finished",
            report.records.len(),
            report.total_candidates
        );
    }
    println!("{}", format_elapsed(report.elapsed));
    info!(records = report.records.len(), "report printed");
    Ok(())
}
