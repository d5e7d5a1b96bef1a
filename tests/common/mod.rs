//! Common test utilities for integration tests
//!
//! Template builders with correctly placed columns and helpers to write
//! shell scripts standing in for the fitting program.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Number of header lines before the parameter table.
pub const HEADER_LINES: usize = 12;

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Setup test logging
///
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// A parameter table row: name in field 0, flag at byte columns 92..94,
/// order digits from column 98.
pub fn row(name: &str, flag: u8, order: &str) -> String {
    let mut line = format!("{name},");
    let first_width = 19usize.saturating_sub(line.len()).max(1);
    line.push_str(&format!("{:>first_width$},", "1.0"));
    for k in 2..10 {
        line.push_str(&format!("{:>8},", format!("{k}.0")));
    }
    line.push_str(&format!("{flag:>2},"));
    line.push_str(&format!("   {order:<6}"));
    line.push_str(",\n");
    line
}

/// Full template text: 12 header lines (one with the iteration directive),
/// the rows, the end sentinel and trailing data.
pub fn template_text(rows: &[String]) -> String {
    let mut text = String::from("Test molecule\n");
    text.push_str(
        "10                      !Number of iterations (negative number means robust weighting fit)\n",
    );
    for i in 2..HEADER_LINES {
        text.push_str(&format!("header line {i}\n"));
    }
    for row in rows {
        text.push_str(row);
    }
    text.push_str("&&&END, end of parameters\ntrailing data\n");
    text
}

/// Write `text` as `name` under `dir`, returning its path.
pub fn write_template(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).expect("Failed to write template");
    path
}

/// Write an executable `/bin/sh` script. It is called as `script <input-file>`
/// from inside a worker directory.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("Failed to write script");
    let mut perms = std::fs::metadata(&path).expect("script metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("Failed to chmod script");
    path
}

/// Shell condition true when the input frees `name` (its flag column reads 1).
pub fn frees(name: &str) -> String {
    format!(
        "awk 'index($0, \"{name},\") == 1 && substr($0, 94, 1) == \"1\" {{ found = 1 }} END {{ exit !found }}' \"$1\""
    )
}

/// Names of leftover worker directories under `dir`.
pub fn worker_dirs(dir: &Path, prefix: &str) -> Vec<String> {
    std::fs::read_dir(dir)
        .expect("read dir")
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(prefix))
        .collect()
}
