//! Raw cgroup-v2 file operations.
//!
//! Two files matter to the governor: `cpu.stat`, whose `usage_usec` field is
//! the monotonic cumulative CPU counter, and `cpu.max`, which accepts
//! `"<quota> <period>"` in microseconds (`"max <period>"` lifts the cap).
//! This module does the reads and writes and nothing else; interpretation
//! belongs to the adapters above it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors touching cgroup control files.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CgroupError {
    /// Reading a control file failed.
    #[error("cannot read {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Writing a control file failed.
    #[error("cannot write {path}: {source}")]
    Write {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// `cpu.stat` has no `usage_usec` field.
    #[error("{path} has no usage_usec field")]
    MissingUsage {
        /// File that was scanned.
        path: PathBuf,
    },

    /// A counter value did not parse as an integer.
    #[error("{path}: cannot parse {value:?} as microseconds")]
    Malformed {
        /// File that was scanned.
        path: PathBuf,
        /// The offending token.
        value: String,
    },
}

/// Reads the cumulative CPU usage counter from `<cgroup>/cpu.stat`, in
/// microseconds.
///
/// # Errors
///
/// Returns [`CgroupError`] when the file cannot be read, the `usage_usec`
/// field is absent, or its value does not parse.
pub fn read_usage_usec(cgroup: &Path) -> Result<u64, CgroupError> {
    let path = cgroup.join("cpu.stat");
    let content = fs::read_to_string(&path).map_err(|source| CgroupError::Read {
        path: path.clone(),
        source,
    })?;

    for line in content.lines() {
        let mut tokens = line.split_whitespace();
        if tokens.next() == Some("usage_usec") {
            let value = tokens.next().ok_or_else(|| CgroupError::MissingUsage {
                path: path.clone(),
            })?;
            return value.parse().map_err(|_| CgroupError::Malformed {
                path: path.clone(),
                value: value.to_string(),
            });
        }
    }
    Err(CgroupError::MissingUsage { path })
}

/// Writes `"<quota> <period>"` to `<cgroup>/cpu.max`.
///
/// # Errors
///
/// Returns [`CgroupError::Write`] when the write fails.
pub fn write_cpu_max(cgroup: &Path, quota_us: u64, period_us: u64) -> Result<(), CgroupError> {
    write_max_file(cgroup, &format!("{quota_us} {period_us}"))
}

/// Writes `"max <period>"` to `<cgroup>/cpu.max`, lifting the cap.
///
/// Used only by the shutdown restore path; the governor itself never emits
/// an unlimited quota.
///
/// # Errors
///
/// Returns [`CgroupError::Write`] when the write fails.
pub fn write_cpu_max_unlimited(cgroup: &Path, period_us: u64) -> Result<(), CgroupError> {
    write_max_file(cgroup, &format!("max {period_us}"))
}

fn write_max_file(cgroup: &Path, value: &str) -> Result<(), CgroupError> {
    let path = cgroup.join("cpu.max");
    fs::write(&path, value).map_err(|source| CgroupError::Write { path, source })
}
