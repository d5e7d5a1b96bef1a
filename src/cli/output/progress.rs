//! Live sweep output using indicatif
//!
//! The result lines go to stdout as candidates finish. A progress bar on
//! stderr counts finished candidates and names the ones in flight.

use std::collections::BTreeMap;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::domain::models::{Candidate, ResultRecord, WorkerSlot};

const PROGRESS_TEMPLATE: &str = "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}";
const PROGRESS_CHARS: &str = "█▓▒░ ";

/// Column titles of the live result lines, aligned like [`ResultRecord`]'s
/// `Display`.
pub fn live_header() -> String {
    format!("{:<13} {:>2} {} {}", "Parameter", "F", "wrms", "rms_MHz")
}

/// Banner framing the live table.
pub fn banner(input: &str, program: &str, workers: usize, candidates: usize) -> String {
    let rule = "=".repeat(64);
    format!(
        "{rule}\nfitsweep {input}\n  program: {program}\n  workers: {workers}\n  candidates: {candidates}\n{rule}"
    )
}

/// Create a progress bar with the sweep style
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template(PROGRESS_TEMPLATE)
        .map_or_else(|_| ProgressStyle::default_bar(), |s| s.progress_chars(PROGRESS_CHARS));
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(200));
    pb
}

/// Extension trait for finishing the bar with a status
pub trait ProgressBarExt {
    /// Finish with a success message
    fn finish_success(&self, message: impl Into<String>);

    /// Finish with a warning message
    fn finish_warning(&self, message: impl Into<String>);
}

impl ProgressBarExt for ProgressBar {
    fn finish_success(&self, message: impl Into<String>) {
        self.finish_with_message(format!("✓ {}", message.into()));
    }

    fn finish_warning(&self, message: impl Into<String>) {
        self.abandon_with_message(format!("⚠ {}", message.into()));
    }
}

/// Live view of a running sweep.
pub struct SweepProgress {
    bar: ProgressBar,
    in_flight: BTreeMap<usize, String>,
    print_lines: bool,
}

impl SweepProgress {
    /// Visible bar plus result lines on stdout.
    pub fn new(total: usize) -> Self {
        Self {
            bar: create_progress_bar(total as u64),
            in_flight: BTreeMap::new(),
            print_lines: true,
        }
    }

    /// Nothing drawn or printed (JSON mode).
    pub fn hidden(total: usize) -> Self {
        let bar = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::hidden());
        Self {
            bar,
            in_flight: BTreeMap::new(),
            print_lines: false,
        }
    }

    /// Print a line to stdout without tearing the bar.
    pub fn println(&self, line: &str) {
        if self.print_lines {
            self.bar.suspend(|| println!("{line}"));
        }
    }

    pub fn started(&mut self, slot: WorkerSlot, candidate: &Candidate) {
        self.in_flight.insert(slot.index(), candidate.to_string());
        self.refresh_message();
    }

    pub fn finished(&mut self, slot: WorkerSlot, record: &ResultRecord) {
        self.in_flight.remove(&slot.index());
        self.println(&record.to_string());
        self.bar.inc(1);
        self.refresh_message();
    }

    pub fn finish(&self, cancelled: bool) {
        if cancelled {
            self.bar.finish_warning("cancelled");
        } else {
            self.bar.finish_success("done");
        }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    fn refresh_message(&self) {
        let running: Vec<&str> = self.in_flight.values().map(String::as_str).collect();
        self.bar.set_message(running.join(", "));
    }
}
