//! End-to-end sweeps with a shell script as the fitting program.
#![cfg(unix)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use fitsweep::adapters::process::ProgramLauncher;
use fitsweep::application::{RunnerSettings, StreamMonitor, SweepEvent, SweepOrchestrator};
use fitsweep::domain::models::{
    CandidateFilter, Config, MetricValue, MonitorConfig, StopReason, Template,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const PREFIX: &str = ".fitsweep_worker_";

fn orchestrator(root: &std::path::Path, program: &std::path::Path) -> SweepOrchestrator {
    let settings = RunnerSettings::from_config(root, &Config::default());
    let launcher = ProgramLauncher::new(program.to_string_lossy()).unwrap();
    let monitor = StreamMonitor::new(MonitorConfig::default()).with_stop_grace(Duration::from_secs(1));
    SweepOrchestrator::new(settings, Arc::new(launcher), monitor)
}

#[tokio::test]
async fn test_full_sweep_ranks_and_collects_outputs() {
    let dir = common::temp_dir();
    let root = dir.path();
    // Gab improves the fit, Hab diverges, everything else is middling
    let script = common::write_script(
        root,
        "fit.sh",
        &format!(
            r#"if {gab}; then
  echo " wrms= 0.5"; echo " wrms= 0.4"; echo " rms_MHz= 0.01"; echo "rmscat_MHz"
elif {hab}; then
  echo " wrms= 3.0"; echo " NaN in jacobian"; exec sleep 30
else
  echo " wrms= 2.0"; echo " rms_MHz= 0.2"
fi"#,
            gab = common::frees("Gab"),
            hab = common::frees("Hab"),
        ),
    );
    let text = common::template_text(&[
        common::row("Dab", 0, "2 0 0"),
        common::row("Gab", 0, "1 0 0"),
        common::row("Hab", 0, "1 1 0"),
        common::row("Fre", 1, "1 0 0"),
    ]);
    let template = Template::from_text(&text);
    let candidates = template.candidates(&CandidateFilter::All).unwrap();
    assert_eq!(candidates.len(), 5);

    let report = orchestrator(root, &script)
        .run(Arc::new(template), candidates, 3, CancellationToken::new())
        .await
        .unwrap();

    assert!(report.is_complete());
    let ranked: Vec<String> = report.ranked().iter().map(|r| r.candidate.to_string()).collect();
    assert_eq!(ranked[0], "Gab");

    let by_name = |name: &str| {
        report
            .records
            .iter()
            .find(|r| r.candidate.to_string() == name)
            .unwrap()
    };
    assert_eq!(by_name("Gab").stop_reason, StopReason::Converged);
    assert_eq!(by_name("Gab").metrics.weighted_residual, MetricValue::Value("0.5".into()));
    assert_eq!(by_name("Hab").stop_reason, StopReason::NumericFailure);
    assert_eq!(by_name("Hab").metrics.unweighted_residual_mhz, MetricValue::NaN);
    assert_eq!(by_name("Fre").stop_reason, StopReason::Skipped);
    assert_eq!(by_name("Fre").metrics.weighted_residual, MetricValue::NotEvaluated);
    assert_eq!(by_name("Initial Ref").metrics.weighted_residual, MetricValue::Value("2.0".into()));

    let outputs = root.join("outputs");
    assert!(outputs.join("Gab.out").exists());
    assert!(outputs.join("Hab.out").exists());
    assert!(outputs.join("Dab.out").exists());
    assert!(!outputs.join("Fre.out").exists());
    assert!(common::worker_dirs(root, PREFIX).is_empty());
}

#[tokio::test]
async fn test_order_filter_limits_the_sweep() {
    let dir = common::temp_dir();
    let script = common::write_script(dir.path(), "fit.sh", r#"echo " wrms= 1.0""#);
    let text = common::template_text(&[
        common::row("A1", 0, "1"),
        common::row("A2", 0, "2"),
        common::row("A21", 0, "2 1"),
        common::row("A3", 0, "3"),
    ]);
    let template = Template::from_text(&text);
    let candidates = template.candidates(&CandidateFilter::MaxOrder(2)).unwrap();

    let report = orchestrator(dir.path(), &script)
        .run(Arc::new(template), candidates, 2, CancellationToken::new())
        .await
        .unwrap();

    let mut names: Vec<String> = report.records.iter().map(|r| r.candidate.to_string()).collect();
    names.sort();
    assert_eq!(names, vec!["A1", "A2", "A21", "Initial Ref"]);
}

#[tokio::test]
async fn test_cancelled_sweep_cleans_up_and_keeps_finished_records() {
    let dir = common::temp_dir();
    let root = dir.path();
    let script = common::write_script(
        root,
        "fit.sh",
        &format!(
            r#"if {hang}; then
  echo " wrms= 9.0"; exec sleep 30
fi
echo " wrms= 1.0""#,
            hang = common::frees("P3"),
        ),
    );
    let rows: Vec<String> = (0..9).map(|i| common::row(&format!("P{i}"), 0, "1 0 0")).collect();
    let template = Template::from_text(&common::template_text(&rows));
    let candidates = template.candidates(&CandidateFilter::All).unwrap();
    assert_eq!(candidates.len(), 10);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let orchestrator = orchestrator(root, &script).with_events(tx);
    let cancel = CancellationToken::new();

    // cancel once every candidate except the hanging one has finished
    let trigger = cancel.clone();
    let watcher = tokio::spawn(async move {
        let mut finished = 0;
        while let Some(event) = rx.recv().await {
            if matches!(event, SweepEvent::Finished { .. }) {
                finished += 1;
                if finished == 9 {
                    trigger.cancel();
                }
            }
        }
        finished
    });

    let report = tokio::time::timeout(
        Duration::from_secs(20),
        orchestrator.run(Arc::new(template), candidates, 3, cancel),
    )
    .await
    .expect("cancelled sweep should return promptly")
    .unwrap();
    drop(orchestrator);

    assert!(report.cancelled);
    assert_eq!(report.records.len(), 9);
    assert!(report.records.iter().all(|r| r.candidate.to_string() != "P3"));
    assert_eq!(watcher.await.unwrap(), 9);
    assert!(common::worker_dirs(root, PREFIX).is_empty());
}
