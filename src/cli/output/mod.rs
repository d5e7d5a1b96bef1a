//! CLI output formatting module
//!
//! Live progress while the sweep runs and the final ranked table.

pub mod progress;
pub mod table;

pub use progress::{ProgressBarExt, SweepProgress};
pub use table::{format_elapsed, ReportFormatter};
