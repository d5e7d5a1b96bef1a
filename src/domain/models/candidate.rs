//! Candidate parameters and worker slots.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Label printed for the baseline candidate.
pub const BASELINE_LABEL: &str = "Initial Ref";

/// Suffix of the persisted stdout artifact.
pub const ARTIFACT_SUFFIX: &str = ".out";

/// One parameter (or the baseline) tested as a free fit variable.
///
/// The identifier keeps the column padding of the template row it came from.
/// Rows are matched by prefix, so `"Dab  "` must not match `"DabJ "`; trimming
/// the identifier would break that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    identifier: Option<String>,
    is_already_free: bool,
}

impl Candidate {
    /// The distinguished "no parameter changed" candidate.
    pub const fn baseline() -> Self {
        Self {
            identifier: None,
            is_already_free: false,
        }
    }

    pub fn parameter(identifier: impl Into<String>, is_already_free: bool) -> Self {
        Self {
            identifier: Some(identifier.into()),
            is_already_free,
        }
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub const fn is_baseline(&self) -> bool {
        self.identifier.is_none()
    }

    pub const fn is_already_free(&self) -> bool {
        self.is_already_free
    }

    /// Human-readable label, padding preserved.
    pub fn label(&self) -> &str {
        self.identifier.as_deref().unwrap_or(BASELINE_LABEL)
    }

    /// Name of the persisted stdout artifact, or `None` for the baseline.
    ///
    /// Padding and `*` markers are stripped so the name is a usable filename.
    pub fn artifact_name(&self) -> Option<String> {
        self.identifier
            .as_deref()
            .map(|id| format!("{}{ARTIFACT_SUFFIX}", id.trim().replace('*', "")))
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label().trim())
    }
}

/// Identity of one pool worker.
///
/// Each slot owns exactly one scratch directory under the sweep root; no two
/// slots share one, so runners never step on each other's input files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerSlot(usize);

impl WorkerSlot {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }

    /// The scratch directory this slot owns.
    pub fn directory(self, root: &Path, prefix: &str) -> PathBuf {
        root.join(format!("{prefix}{}", self.0))
    }
}

impl fmt::Display for WorkerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_label_and_artifact() {
        let baseline = Candidate::baseline();
        assert!(baseline.is_baseline());
        assert!(!baseline.is_already_free());
        assert_eq!(baseline.label(), BASELINE_LABEL);
        assert_eq!(baseline.artifact_name(), None);
    }

    #[test]
    fn test_parameter_keeps_padding() {
        let candidate = Candidate::parameter("Dab      ", false);
        assert_eq!(candidate.identifier(), Some("Dab      "));
        assert_eq!(candidate.label(), "Dab      ");
        assert_eq!(candidate.to_string(), "Dab");
    }

    #[test]
    fn test_artifact_name_is_sanitized() {
        let candidate = Candidate::parameter("  F*bc  ", true);
        assert_eq!(candidate.artifact_name().as_deref(), Some("Fbc.out"));
    }

    #[test]
    fn test_worker_slot_directory() {
        let slot = WorkerSlot::new(3);
        let dir = slot.directory(Path::new("/tmp/sweep"), ".fitsweep_worker_");
        assert_eq!(dir, PathBuf::from("/tmp/sweep/.fitsweep_worker_3"));
        assert_eq!(slot.index(), 3);
    }
}
