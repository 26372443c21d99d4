//! Workload identity and declaration.
//!
//! A workload is a governed entity: one cgroup, one declared budget, one
//! policy state. Workloads are distinct: the id is the only notion of
//! identity anywhere in the engine, and two workloads never share state.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error constructing a [`WorkloadId`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WorkloadIdError {
    /// The id was empty or whitespace-only.
    #[error("workload id must be a non-empty string")]
    Empty,
}

/// Unique identifier for a governed workload.
///
/// Wraps a non-empty string. Construction validates; the inner value is
/// immutable afterwards, so a held `WorkloadId` is always well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkloadId(String);

impl WorkloadId {
    /// Creates a workload id from a string.
    ///
    /// # Errors
    ///
    /// Returns [`WorkloadIdError::Empty`] if the string is empty or contains
    /// only whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self, WorkloadIdError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(WorkloadIdError::Empty);
        }
        Ok(Self(id))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Declaration of a single workload: identity, budget, and the cgroup it
/// lives in.
///
/// The budget is microseconds of CPU time allowed per enforcement window and
/// is immutable for the workload's lifetime. A zero budget is a valid
/// declaration meaning "no CPU permitted".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadSpec {
    /// Unique workload identifier.
    pub id: WorkloadId,

    /// Declared CPU budget in microseconds per window.
    pub budget_us: u64,

    /// Absolute path to the workload's cgroup directory.
    ///
    /// Consumed only by kernel-facing adapters; the policy engine never
    /// reads it.
    pub cgroup: PathBuf,
}
