//! Decision records and their canonical encoding.
//!
//! A [`DecisionRecord`] captures every input and output of one policy step
//! for one workload in one window. The record stream is the governor's only
//! externalized decision state: it is written after commit, it never feeds
//! back into a decision, and replaying it must reconstruct it byte for byte.
//!
//! # Canonical encoding
//!
//! One JSON object per line, fields in fixed declaration order, integer-only
//! numerics, no timestamps. Two runs over identical inputs produce identical
//! bytes; any divergence is a correctness failure, not a formatting nit.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::{Mode, RuleId};
use crate::workload::WorkloadId;

/// Errors decoding a recorded decision line.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RecordError {
    /// The line is not a valid decision record.
    #[error("malformed decision record at line {line}: {source}")]
    Malformed {
        /// One-based line number within the input.
        line: usize,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
}

/// Immutable record of one policy step.
///
/// Field names follow the governor's wire vocabulary (`w`, `U_w`, `B`, `W`,
/// `T_w`) so logs read in the same terms operators declare budgets in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecisionRecord {
    /// Window index the observation covers.
    #[serde(rename = "w")]
    pub window: u64,

    /// Workload the decision applies to.
    pub workload_id: WorkloadId,

    /// Mode going into the step.
    pub mode_in: Mode,

    /// Debt going into the step, microseconds.
    #[serde(rename = "debt_in")]
    pub debt_in_us: u64,

    /// Observed CPU usage for the window, microseconds.
    #[serde(rename = "U_w")]
    pub usage_us: u64,

    /// Declared budget, microseconds per window.
    #[serde(rename = "B")]
    pub budget_us: u64,

    /// Window size, microseconds.
    #[serde(rename = "W")]
    pub window_us: u64,

    /// Mode after the step.
    pub mode_out: Mode,

    /// Debt after the step, microseconds.
    #[serde(rename = "debt_out")]
    pub debt_out_us: u64,

    /// Quota enforced for the next window, microseconds.
    #[serde(rename = "T_w")]
    pub quota_us: u64,

    /// The policy rule that fired.
    pub rule_id: RuleId,
}

impl DecisionRecord {
    /// Encodes the record as its canonical single-line JSON form, without a
    /// trailing newline.
    ///
    /// Serialization of this type cannot fail: every field is an integer, an
    /// enum with a fixed name, or a validated string.
    #[must_use]
    pub fn canonical_line(&self) -> String {
        serde_json::to_string(self).expect("decision record serialization is infallible")
    }

    /// Decodes one canonical line. `line_no` is used only for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Malformed`] when the line does not decode as a
    /// decision record.
    pub fn from_line(line: &str, line_no: usize) -> Result<Self, RecordError> {
        serde_json::from_str(line).map_err(|source| RecordError::Malformed {
            line: line_no,
            source,
        })
    }
}

impl std::fmt::Display for DecisionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical_line())
    }
}
