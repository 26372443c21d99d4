//! Daemon configuration loading.
//!
//! Configuration is a TOML file, loaded once at startup:
//!
//! ```toml
//! window_us = 100000
//! capacity_us = 800000          # optional; defaults to online CPUs x window
//! decision_log = "/var/log/rgov/decisions.jsonl"
//!
//! [[workload]]
//! id = "web"
//! budget_us = 100000
//! cgroup = "/sys/fs/cgroup/web"
//! ```
//!
//! Unknown fields are rejected; a typo in a budget line must not silently
//! govern with defaults.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rgov_core::{
    ConfigError, GovernorConfig, WorkloadId, WorkloadIdError, WorkloadSpec, DEFAULT_WINDOW_US,
};
use serde::Deserialize;
use thiserror::Error;

/// Default decision log location, relative to the working directory.
pub const DEFAULT_DECISION_LOG: &str = "rgov-decisions.jsonl";

/// Errors loading a configuration file.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigFileError {
    /// The file could not be read.
    #[error("cannot read config {path}: {source}")]
    Read {
        /// Config path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The file is not valid TOML for the expected schema.
    #[error("cannot parse config {path}: {source}")]
    Parse {
        /// Config path.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: Box<toml::de::Error>,
    },

    /// A workload id failed validation.
    #[error(transparent)]
    WorkloadId(#[from] WorkloadIdError),

    /// The assembled configuration failed admission.
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default = "default_window_us")]
    window_us: u64,
    capacity_us: Option<u64>,
    #[serde(default = "default_decision_log")]
    decision_log: PathBuf,
    #[serde(default, rename = "workload")]
    workloads: Vec<WorkloadTable>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WorkloadTable {
    id: String,
    budget_us: u64,
    cgroup: PathBuf,
}

fn default_window_us() -> u64 {
    DEFAULT_WINDOW_US
}

fn default_decision_log() -> PathBuf {
    PathBuf::from(DEFAULT_DECISION_LOG)
}

/// Fully loaded daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    /// The validated governor configuration.
    pub governor: GovernorConfig,
    /// Where the decision stream is written.
    pub decision_log: PathBuf,
}

impl DaemonConfig {
    /// Loads and validates a configuration file.
    ///
    /// When `capacity_us` is not declared it defaults to
    /// `online CPUs x window_us`: the whole host, which admits any budget
    /// split that physically fits.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigFileError`] on unreadable files, schema violations,
    /// invalid workload ids, or failed admission.
    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ConfigFile = toml::from_str(&content).map_err(|source| ConfigFileError::Parse {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;

        let capacity_us = match file.capacity_us {
            Some(explicit) => explicit,
            None => detected_capacity_us(file.window_us),
        };

        let workloads = file
            .workloads
            .into_iter()
            .map(|table| {
                Ok(WorkloadSpec {
                    id: WorkloadId::new(table.id)?,
                    budget_us: table.budget_us,
                    cgroup: table.cgroup,
                })
            })
            .collect::<Result<Vec<_>, WorkloadIdError>>()?;

        let governor = GovernorConfig {
            window_us: file.window_us,
            capacity_us,
            workloads,
        };
        governor.validate()?;

        Ok(Self {
            governor,
            decision_log: file.decision_log,
        })
    }
}

/// Host capacity in CPU-microseconds per window: online CPUs times the
/// window size.
fn detected_capacity_us(window_us: u64) -> u64 {
    let cpus = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1) as u64;
    cpus.saturating_mul(window_us)
}
