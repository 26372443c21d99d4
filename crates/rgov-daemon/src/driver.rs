//! Wall-clock run loop.
//!
//! The driver is the only place wall time exists. It sleeps one window
//! between synchronous `tick()` calls on an absolute deadline schedule, so
//! tick processing time does not stretch the window cadence. The core never
//! observes the sleep, the deadline, or the drift; time enters the engine
//! only as the window index advancing by one per tick.
//!
//! Drift is observed, warned about, and resynced; it is never corrected by
//! catch-up ticking and never fed into policy.
//!
//! Shutdown (SIGINT/SIGTERM, a fatal tick error, or the optional window
//! limit) flushes the decision log and makes a best-effort restore of
//! `cpu.max` on every governed cgroup.

use std::io;
use std::path::Path;
use std::time::Duration;

use rgov_core::{Orchestrator, SinkError, StartupError, TickError};
use thiserror::Error;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::Instant;

use crate::config::DaemonConfig;
use crate::decision_log::{JsonlSink, LogError};
use crate::enforcement::CgroupEnforcer;
use crate::observation::CgroupObserver;

/// Fatal daemon failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DaemonError {
    /// The decision log could not be opened.
    #[error(transparent)]
    Log(#[from] LogError),

    /// The orchestrator could not start.
    #[error(transparent)]
    Startup(#[from] StartupError),

    /// A window tick failed.
    #[error(transparent)]
    Tick(#[from] TickError),

    /// The decision log could not be flushed at shutdown.
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// Signal handlers could not be installed.
    #[error("cannot install signal handler: {source}")]
    Signal {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Driver options.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverOptions {
    /// Stop cleanly after this many windows. `None` runs until a signal.
    pub max_windows: Option<u64>,
}

/// What a completed run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Windows ticked.
    pub windows: u64,
    /// Non-fatal kernel write failures across the run.
    pub enforcement_failures: u64,
}

/// Runs the governor until a signal, a fatal error, or the window limit.
///
/// # Errors
///
/// Returns [`DaemonError`] on startup failure or the first fatal tick
/// error. The decision log is flushed and `cpu.max` restored on every exit
/// path that reaches a running orchestrator.
pub async fn run(config: &DaemonConfig, options: DriverOptions) -> Result<RunSummary, DaemonError> {
    warn_if_unprivileged(config);

    let mut observer = CgroupObserver::new();
    let mut enforcer = CgroupEnforcer::new();
    for spec in &config.governor.workloads {
        observer.track(spec.id.clone(), spec.cgroup.clone());
        enforcer.govern(spec.id.clone(), spec.cgroup.clone());
    }
    let sink = JsonlSink::create(&config.decision_log)?;

    let mut orchestrator = Orchestrator::new(&config.governor, observer, enforcer, sink)?;
    let window_us = config.governor.window_us;
    let period = Duration::from_micros(window_us);

    let mut sigint = signal(SignalKind::interrupt()).map_err(|source| DaemonError::Signal { source })?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(|source| DaemonError::Signal { source })?;

    tracing::info!(
        window_us,
        workloads = config.governor.workloads.len(),
        decision_log = %config.decision_log.display(),
        "governor running"
    );

    let mut summary = RunSummary::default();
    let mut deadline = Instant::now() + period;
    let run_result: Result<(), DaemonError> = loop {
        tokio::select! {
            () = tokio::time::sleep_until(deadline) => {},
            _ = sigint.recv() => {
                tracing::info!("SIGINT received; shutting down");
                break Ok(());
            },
            _ = sigterm.recv() => {
                tracing::info!("SIGTERM received; shutting down");
                break Ok(());
            },
        }

        match orchestrator.tick() {
            Ok(report) => {
                summary.windows += 1;
                summary.enforcement_failures += report.enforcement_failures as u64;
                tracing::debug!(
                    window = report.window,
                    decisions = report.decisions,
                    enforcement_failures = report.enforcement_failures,
                    "window ticked"
                );
            },
            Err(err) => break Err(err.into()),
        }

        if options
            .max_windows
            .is_some_and(|max| summary.windows >= max)
        {
            tracing::info!(windows = summary.windows, "window limit reached");
            break Ok(());
        }

        deadline += period;
        let now = Instant::now();
        if now >= deadline {
            // We are at least one full window behind schedule. Resync the
            // deadline instead of catch-up ticking; the window index keeps
            // counting executed ticks.
            let behind = now.duration_since(deadline) + period;
            tracing::warn!(behind_us = behind.as_micros() as u64, "scheduling drift; deadline resynced");
            deadline = now + period;
        }
    };

    let flush_result = orchestrator.flush();
    let (_, mut enforcer, _) = orchestrator.into_parts();
    enforcer.restore_unlimited(window_us);

    run_result?;
    flush_result?;
    Ok(summary)
}

/// Warns when governing real cgroups without root; `cpu.max` writes will
/// almost certainly fail with EACCES.
fn warn_if_unprivileged(config: &DaemonConfig) {
    let governs_system_cgroups = config
        .governor
        .workloads
        .iter()
        .any(|spec| spec.cgroup.starts_with(Path::new("/sys/fs/cgroup")));
    if governs_system_cgroups && !nix::unistd::Uid::effective().is_root() {
        tracing::warn!("not running as root; writes to /sys/fs/cgroup will likely be denied");
    }
}
