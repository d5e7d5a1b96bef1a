//! Convergence metrics and per-candidate result records.

use std::cmp::Ordering;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::candidate::Candidate;

/// Textual marker the fitting program prints for numeric failure.
pub const NAN_MARKER: &str = "NaN";

/// One convergence score as printed by the fitting program.
///
/// Scores stay textual: downstream reports compare `NaN` rows verbatim and
/// the program's own formatting must be reproduced exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum MetricValue {
    /// Token copied from a residual line.
    Value(String),
    /// No usable residual line was seen, or the fit diverged.
    NaN,
    /// The candidate was skipped and never run.
    NotEvaluated,
}

impl MetricValue {
    /// Extract the score from a residual line such as `" wrms=  0.8123 ..."`.
    ///
    /// The score is the first whitespace-separated token between the first
    /// and second `=`. A line without one resolves to [`MetricValue::NaN`].
    pub fn from_residual_line(line: &str) -> Self {
        line.split('=')
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .map_or(Self::NaN, |token| Self::from(token.to_string()))
    }

    /// Resolve a residual history to a single score.
    ///
    /// With two or more lines the second-to-last wins: the last pass may have
    /// re-included previously rejected assignments and inflated the residual.
    pub fn from_history(history: &[String]) -> Self {
        let chosen = match history {
            [] => None,
            [only] => Some(only),
            [.., second_to_last, _] => Some(second_to_last),
        };
        chosen.map_or(Self::NaN, |line| Self::from_residual_line(line))
    }

    pub const fn is_nan(&self) -> bool {
        matches!(self, Self::NaN)
    }

    /// Numeric view used for ranking; Fortran `D` exponents are accepted.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Value(token) => token
                .replace(['D', 'd'], "E")
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite()),
            Self::NaN | Self::NotEvaluated => None,
        }
    }
}

impl From<String> for MetricValue {
    fn from(token: String) -> Self {
        match token.as_str() {
            "" => Self::NotEvaluated,
            NAN_MARKER => Self::NaN,
            _ => Self::Value(token),
        }
    }
}

impl From<MetricValue> for String {
    fn from(value: MetricValue) -> Self {
        value.to_string()
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(token) => f.write_str(token),
            Self::NaN => f.write_str(NAN_MARKER),
            Self::NotEvaluated => Ok(()),
        }
    }
}

/// Weighted and unweighted residual of one fit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricPair {
    pub weighted_residual: MetricValue,
    pub unweighted_residual_mhz: MetricValue,
}

impl MetricPair {
    pub const fn new(weighted_residual: MetricValue, unweighted_residual_mhz: MetricValue) -> Self {
        Self {
            weighted_residual,
            unweighted_residual_mhz,
        }
    }

    pub const fn nan() -> Self {
        Self::new(MetricValue::NaN, MetricValue::NaN)
    }

    pub const fn not_evaluated() -> Self {
        Self::new(MetricValue::NotEvaluated, MetricValue::NotEvaluated)
    }

    /// Resolve both histories independently.
    pub fn from_histories(weighted: &[String], unweighted: &[String]) -> Self {
        Self::new(
            MetricValue::from_history(weighted),
            MetricValue::from_history(unweighted),
        )
    }
}

/// Why a candidate's output stream stopped being consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The program closed its output without a convergence line.
    StreamEnded,
    /// The convergence line was seen and the program ran to completion.
    Converged,
    /// A NaN showed up in the output.
    NumericFailure,
    /// Too many consecutive low-order coefficient exclusions.
    ExcessiveBadIterations,
    /// The sweep was cancelled while the fit was running.
    Cancelled,
    /// The program could not be started.
    LaunchFailed,
    /// The parameter already varies in the baseline; nothing was run.
    Skipped,
}

impl StopReason {
    /// Whether the monitor killed the process rather than letting it finish.
    pub const fn is_forced(self) -> bool {
        matches!(
            self,
            Self::NumericFailure | Self::ExcessiveBadIterations | Self::Cancelled
        )
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::StreamEnded => "stream_ended",
            Self::Converged => "converged",
            Self::NumericFailure => "numeric_failure",
            Self::ExcessiveBadIterations => "excessive_bad_iterations",
            Self::Cancelled => "cancelled",
            Self::LaunchFailed => "launch_failed",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Outcome of one candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    pub candidate: Candidate,
    pub metrics: MetricPair,
    pub stop_reason: StopReason,
    pub elapsed_secs: f64,
    pub finished_at: DateTime<Utc>,
}

impl ResultRecord {
    pub fn new(
        candidate: Candidate,
        metrics: MetricPair,
        stop_reason: StopReason,
        elapsed: Duration,
    ) -> Self {
        Self {
            candidate,
            metrics,
            stop_reason,
            elapsed_secs: elapsed.as_secs_f64(),
            finished_at: Utc::now(),
        }
    }

    /// Ranking by weighted residual; unusable scores sort last.
    pub fn cmp_by_weighted_residual(&self, other: &Self) -> Ordering {
        match (
            self.metrics.weighted_residual.as_f64(),
            other.metrics.weighted_residual.as_f64(),
        ) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

/// The live progress line: label, free flag, weighted and unweighted residual.
impl fmt::Display for ResultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<13} {:>2} {} {}",
            self.candidate.label(),
            u8::from(self.candidate.is_already_free()),
            self.metrics.weighted_residual,
            self.metrics.unweighted_residual_mhz
        )
    }
}
