//! Table output formatting for the sweep report
//!
//! Renders the ranked result records with comfy-table. Colors follow
//! `NO_COLOR` and dumb terminals.

use std::env;
use std::time::Duration;

use comfy_table::{presets, Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::application::SweepReport;
use crate::domain::models::{MetricValue, ResultRecord, StopReason};

/// Table formatter for the final report
pub struct ReportFormatter {
    /// Whether to use colors in output
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<usize>,
}

impl ReportFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    pub const fn with_config(use_colors: bool, max_width: Option<usize>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// Ranked table of every record, best weighted residual first.
    pub fn format_report(&self, report: &SweepReport) -> String {
        let mut table = self.create_base_table();

        table.set_header(vec![
            Cell::new("#").add_attribute(Attribute::Bold),
            Cell::new("Parameter").add_attribute(Attribute::Bold),
            Cell::new("Free").add_attribute(Attribute::Bold),
            Cell::new("wrms").add_attribute(Attribute::Bold),
            Cell::new("rms_MHz").add_attribute(Attribute::Bold),
            Cell::new("Stop").add_attribute(Attribute::Bold),
            Cell::new("Time (s)").add_attribute(Attribute::Bold),
        ]);

        for (rank, record) in report.ranked().into_iter().enumerate() {
            table.add_row(vec![
                Cell::new(rank + 1).set_alignment(CellAlignment::Right),
                self.name_cell(record, rank == 0),
                Cell::new(u8::from(record.candidate.is_already_free())),
                self.metric_cell(&record.metrics.weighted_residual),
                self.metric_cell(&record.metrics.unweighted_residual_mhz),
                self.stop_cell(record.stop_reason),
                Cell::new(format!("{:.1}", record.elapsed_secs)).set_alignment(CellAlignment::Right),
            ]);
        }

        table.to_string()
    }

    fn name_cell(&self, record: &ResultRecord, best: bool) -> Cell {
        let cell = Cell::new(record.candidate.to_string());
        if self.use_colors && best && record.metrics.weighted_residual.as_f64().is_some() {
            cell.fg(Color::Green).add_attribute(Attribute::Bold)
        } else {
            cell
        }
    }

    fn metric_cell(&self, value: &MetricValue) -> Cell {
        let cell = match value {
            MetricValue::NotEvaluated => Cell::new("-"),
            other => Cell::new(other.to_string()),
        }
        .set_alignment(CellAlignment::Right);

        if self.use_colors && value.is_nan() {
            cell.fg(Color::Red)
        } else {
            cell
        }
    }

    fn stop_cell(&self, reason: StopReason) -> Cell {
        let cell = Cell::new(reason.to_string());
        if !self.use_colors {
            return cell;
        }
        cell.fg(stop_color(reason))
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width.and_then(|w| u16::try_from(w).ok()) {
            table.set_width(width);
        }

        table
    }
}

impl Default for ReportFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if the terminal supports colors
fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }

    if let Ok(term) = env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    true
}

const fn stop_color(reason: StopReason) -> Color {
    match reason {
        StopReason::Converged => Color::Green,
        StopReason::StreamEnded | StopReason::Skipped => Color::Reset,
        StopReason::NumericFailure | StopReason::LaunchFailed => Color::Red,
        StopReason::ExcessiveBadIterations | StopReason::Cancelled => Color::Yellow,
    }
}

/// `Total elapsed time: H h M.m min`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    let hours = (secs / 3600.0).floor();
    let minutes = (secs - hours * 3600.0) / 60.0;
    format!("Total elapsed time: {hours:.0} h {minutes:.1} min")
}
