//! Kernel-facing half of the rgov governor.
//!
//! Everything that touches the outside world lives here: the cgroup-v2
//! observation and enforcement adapters, the file-backed decision log, the
//! TOML configuration loader, and the wall-clock driver that calls the
//! core's synchronous `tick()` once per window.
//!
//! The split is deliberate: `rgov-core` proves its behavior offline through
//! replay, and this crate is the thin, stateless-as-possible projection of
//! that behavior onto `/sys/fs/cgroup`.

pub mod cgroup;
pub mod config;
pub mod decision_log;
pub mod driver;
pub mod enforcement;
pub mod observation;

pub use cgroup::CgroupError;
pub use config::{ConfigFileError, DaemonConfig, DEFAULT_DECISION_LOG};
pub use decision_log::{JsonlSink, LogError};
pub use driver::{run, DaemonError, DriverOptions, RunSummary};
pub use enforcement::CgroupEnforcer;
pub use observation::CgroupObserver;
