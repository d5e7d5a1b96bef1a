//! The fitting program's input file and its fixed-column parameter table.
//!
//! The table is a legacy fixed-column format. All raw column offsets live in
//! this module; callers only see [`ParameterRow`], [`CandidateFilter`] and the
//! rewrite helpers on [`Template`].

use std::ops::Range;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::candidate::Candidate;
use crate::domain::errors::TemplateError;

/// Leading lines that precede the parameter table.
pub const HEADER_LINES: usize = 12;

/// A row starting with this token ends the parameter table.
pub const TABLE_END_SENTINEL: &str = "&&&END,";

/// Comma-separated field holding the parameter name.
pub const NAME_FIELD: usize = 0;

/// Comma-separated field holding the free/fixed flag.
pub const FLAG_FIELD: usize = 10;

/// Byte column of the free/fixed flag digit.
pub const FREE_FLAG_COLUMN: usize = 93;

/// Byte columns rewritten when a free parameter is fixed.
pub const FIXED_FLAG_COLUMNS: Range<usize> = 92..94;

/// Byte columns holding the `n t r` order digits.
pub const ORDER_DIGIT_COLUMNS: Range<usize> = 98..104;

/// Substring identifying the iteration-count directive.
pub const ITERATION_DIRECTIVE: &str = "Number of iterations";

/// Replacement directive forcing a pure evaluation.
pub const ZERO_ITERATIONS_LINE: &str =
    "0                       !Number of iterations (negative number means robust weighting fit)";

/// Which parameter rows become candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateFilter {
    /// Every row of the table.
    #[default]
    All,
    /// Rows whose order code is at most this value (1 to 3 digits, `ntr`).
    MaxOrder(u32),
    /// Rows whose trimmed name is in the list.
    Names(Vec<String>),
}

/// One row of the parameter table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterRow {
    /// 1-based line number in the template.
    pub line_number: usize,
    /// Name field with its padding intact.
    pub name: String,
    /// Value of the free/fixed flag.
    pub flag: i64,
    line: String,
}

impl ParameterRow {
    pub const fn is_free(&self) -> bool {
        self.flag != 0
    }

    /// Order digits from the fixed order columns, in `n t r` sequence.
    pub fn order_digits(&self) -> Result<Vec<u32>, TemplateError> {
        parse_order_digits(&self.line, self.line_number)
    }

    /// Whether the row's order code is at most `order`.
    ///
    /// The number of digits in `order` selects how much of the row's code is
    /// compared: one digit reads `n`, two read `nt`, three read `ntr`. Rows
    /// without enough digits never match.
    pub fn within_order(&self, order: u32) -> Result<bool, TemplateError> {
        let digits = self.order_digits()?;
        let matched = match (order, digits.as_slice()) {
            (0..=9, [n, ..]) => *n <= order,
            (10..=99, [n, t, ..]) => n * 10 + t <= order,
            (100.., [n, t, r, ..]) => n * 100 + t * 10 + r <= order,
            _ => false,
        };
        Ok(matched)
    }
}

/// Read the order digits of a table row.
fn parse_order_digits(line: &str, line_number: usize) -> Result<Vec<u32>, TemplateError> {
    let end = ORDER_DIGIT_COLUMNS.end.min(line.len());
    let Some(field) = line.get(ORDER_DIGIT_COLUMNS.start..end) else {
        return Ok(Vec::new());
    };
    field
        .split_whitespace()
        .map(|digit| {
            digit
                .parse::<u32>()
                .map_err(|_| TemplateError::InvalidOrderDigit {
                    line: line_number,
                    value: digit.to_string(),
                })
        })
        .collect()
}

/// Free/fixed flag of a line, if it has a parseable flag field.
fn flag_of(line: &str) -> Option<i64> {
    line.split(',').nth(FLAG_FIELD)?.trim().parse().ok()
}

/// Replace the bytes in `range`, or `None` when the line is too short.
fn splice(line: &str, range: Range<usize>, replacement: &str) -> Option<String> {
    if line.len() < range.end || !line.is_char_boundary(range.start) || !line.is_char_boundary(range.end) {
        return None;
    }
    let mut out = String::with_capacity(line.len());
    out.push_str(&line[..range.start]);
    out.push_str(replacement);
    out.push_str(&line[range.end..]);
    Some(out)
}

/// Line terminator carried by a line, so rewrites keep the file's endings.
fn terminator(line: &str) -> &str {
    if line.ends_with("\r\n") {
        "\r\n"
    } else if line.ends_with('\n') {
        "\n"
    } else {
        ""
    }
}

/// The fitting program's input file, kept line by line with terminators.
///
/// Read once and shared read-only; every rewrite produces a fresh copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    lines: Vec<String>,
}

impl Template {
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.split_inclusive('\n').map(str::to_string).collect(),
        }
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| TemplateError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::from_text(&text))
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Rows of the parameter table, header skipped, stopping at the sentinel.
    pub fn parameter_rows(&self) -> Result<Vec<ParameterRow>, TemplateError> {
        let mut rows = Vec::new();
        for (index, line) in self.lines.iter().enumerate().skip(HEADER_LINES) {
            if line.starts_with(TABLE_END_SENTINEL) {
                break;
            }
            let line_number = index + 1;
            let fields: Vec<&str> = line.split(',').collect();
            if fields.len() <= FLAG_FIELD {
                return Err(TemplateError::MissingField {
                    line: line_number,
                    expected: FLAG_FIELD + 1,
                    found: fields.len(),
                });
            }
            let raw_flag = fields[FLAG_FIELD].trim();
            let flag = raw_flag.parse().map_err(|_| TemplateError::InvalidFlag {
                line: line_number,
                value: raw_flag.to_string(),
            })?;
            rows.push(ParameterRow {
                line_number,
                name: fields[NAME_FIELD].to_string(),
                flag,
                line: line.clone(),
            });
        }
        Ok(rows)
    }

    /// Candidates to sweep, baseline first.
    pub fn candidates(&self, filter: &CandidateFilter) -> Result<Vec<Candidate>, TemplateError> {
        let mut candidates = vec![Candidate::baseline()];
        for row in self.parameter_rows()? {
            let selected = match filter {
                CandidateFilter::All => true,
                CandidateFilter::MaxOrder(order) => row.within_order(*order)?,
                CandidateFilter::Names(names) => {
                    let trimmed = row.name.trim();
                    names.iter().any(|n| n.trim() == trimmed)
                }
            };
            if selected {
                candidates.push(Candidate::parameter(row.name.clone(), row.is_free()));
            }
        }
        Ok(candidates)
    }

    /// Input for the baseline: iteration count forced to zero, rest verbatim.
    pub fn baseline_input(&self) -> String {
        self.lines
            .iter()
            .map(|line| {
                if line.contains(ITERATION_DIRECTIVE) {
                    format!("{ZERO_ITERATIONS_LINE}{}", terminator(line))
                } else {
                    line.clone()
                }
            })
            .collect()
    }

    /// Input with `identifier` freed.
    ///
    /// The row starting with `identifier` gets its flag set to free if it was
    /// fixed. With `fix_others`, every other row whose name is contained in
    /// the identifier (its parent names) and is currently free gets fixed.
    pub fn candidate_input(&self, identifier: &str, fix_others: bool) -> String {
        self.lines
            .iter()
            .map(|line| {
                if line.starts_with(identifier) {
                    if flag_of(line) == Some(0) {
                        if let Some(freed) =
                            splice(line, FREE_FLAG_COLUMN..FREE_FLAG_COLUMN + 1, "1")
                        {
                            return freed;
                        }
                    }
                    return line.clone();
                }
                if fix_others {
                    let name = line.split(',').next().unwrap_or_default();
                    if !name.trim().is_empty()
                        && identifier.contains(name)
                        && flag_of(line) == Some(1)
                    {
                        if let Some(fixed) = splice(line, FIXED_FLAG_COLUMNS, " 0") {
                            return fixed;
                        }
                    }
                }
                line.clone()
            })
            .collect()
    }
}
