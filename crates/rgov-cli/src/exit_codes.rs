//! Deterministic, machine-parseable exit codes.
//!
//! The governor promises exactly two outcomes: proceed cleanly, or halt
//! loudly with a reason a supervisor can parse. Every failure category maps
//! to a fixed exit code, and the last line on stderr is a single JSON object
//! `{"error": <kind>, "message": <human text>}`.
//!
//! # Exit code categories
//!
//! - **0**: clean shutdown
//! - **10-19**: configuration and admission errors
//! - **20-29**: runtime faults (observation, invariants, arithmetic, log I/O)
//! - **30-39**: replay verification failures

use rgov_core::{ObservationError, PolicyError, ReplayError, StartupError, TickError};
use rgov_daemon::{ConfigFileError, DaemonError};
use thiserror::Error;

/// Exit code constants.
pub mod codes {
    /// Clean shutdown.
    pub const SUCCESS: u8 = 0;

    /// Invalid configuration or failed admission (including over-capacity
    /// budget declarations).
    pub const CONFIG_ERROR: u8 = 10;

    /// Unreadable or non-monotonic usage counter.
    pub const OBSERVATION_ERROR: u8 = 20;

    /// A committed decision violated an engine guarantee.
    pub const INVARIANT_VIOLATION: u8 = 21;

    /// Unrepresentable arithmetic in policy.
    pub const OVERFLOW_ERROR: u8 = 22;

    /// Decision log could not be written.
    pub const LOG_ERROR: u8 = 23;

    /// Other runtime failure (signal handler installation and the like).
    pub const RUNTIME_ERROR: u8 = 29;

    /// Replay reconstruction differs from the recording.
    pub const REPLAY_DIVERGENCE: u8 = 30;

    /// Replay input is malformed or incomplete.
    pub const REPLAY_INPUT_ERROR: u8 = 31;
}

/// Top-level command failure: a domain error plus its exit mapping.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CommandError {
    /// Configuration loading or validation failed.
    #[error(transparent)]
    Config(#[from] ConfigFileError),

    /// The daemon run failed.
    #[error(transparent)]
    Daemon(#[from] DaemonError),

    /// Replay verification failed.
    #[error(transparent)]
    Replay(#[from] ReplayError),

    /// Reading or writing a command input/output file failed.
    #[error("{context}: {source}")]
    Io {
        /// What was being accessed.
        context: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl CommandError {
    /// Stable machine-readable failure kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::Daemon(err) => daemon_kind(err),
            Self::Replay(err) => replay_kind(err),
            Self::Io { .. } => "io_error",
        }
    }

    /// Exit code for this failure.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => codes::CONFIG_ERROR,
            Self::Daemon(err) => daemon_code(err),
            Self::Replay(err) => replay_code(err),
            Self::Io { .. } => codes::RUNTIME_ERROR,
        }
    }
}

fn daemon_kind(err: &DaemonError) -> &'static str {
    match err {
        DaemonError::Startup(_) => "config_error",
        DaemonError::Tick(tick) => tick_kind(tick),
        DaemonError::Log(_) | DaemonError::Sink(_) => "log_error",
        DaemonError::Signal { .. } => "runtime_error",
        _ => "runtime_error",
    }
}

fn daemon_code(err: &DaemonError) -> u8 {
    match err {
        DaemonError::Startup(_) => codes::CONFIG_ERROR,
        DaemonError::Tick(tick) => tick_code(tick),
        DaemonError::Log(_) | DaemonError::Sink(_) => codes::LOG_ERROR,
        DaemonError::Signal { .. } => codes::RUNTIME_ERROR,
        _ => codes::RUNTIME_ERROR,
    }
}

fn tick_kind(err: &TickError) -> &'static str {
    match err {
        TickError::Observation(_) => "observation_error",
        TickError::Policy(PolicyError::DebtOverflow { .. }) => "overflow_error",
        TickError::Invariant(_) => "invariant_violation",
        TickError::Sink(_) => "log_error",
        _ => "runtime_error",
    }
}

fn tick_code(err: &TickError) -> u8 {
    match err {
        TickError::Observation(_) => codes::OBSERVATION_ERROR,
        TickError::Policy(PolicyError::DebtOverflow { .. }) => codes::OVERFLOW_ERROR,
        TickError::Invariant(_) => codes::INVARIANT_VIOLATION,
        TickError::Sink(_) => codes::LOG_ERROR,
        _ => codes::RUNTIME_ERROR,
    }
}

fn replay_kind(err: &ReplayError) -> &'static str {
    match err {
        ReplayError::Divergence { .. } | ReplayError::LengthMismatch { .. } => "replay_divergence",
        ReplayError::Record(_)
        | ReplayError::GapInRecording { .. }
        | ReplayError::ShortRecording { .. } => "replay_input_error",
        ReplayError::Startup(StartupError::Config(_) | StartupError::Register(_)) => "config_error",
        ReplayError::Tick(TickError::Observation(ObservationError::MissingRecording {
            ..
        })) => "replay_input_error",
        ReplayError::Tick(tick) => tick_kind(tick),
        _ => "runtime_error",
    }
}

fn replay_code(err: &ReplayError) -> u8 {
    match err {
        ReplayError::Divergence { .. } | ReplayError::LengthMismatch { .. } => {
            codes::REPLAY_DIVERGENCE
        },
        ReplayError::Record(_)
        | ReplayError::GapInRecording { .. }
        | ReplayError::ShortRecording { .. } => codes::REPLAY_INPUT_ERROR,
        ReplayError::Startup(StartupError::Config(_) | StartupError::Register(_)) => {
            codes::CONFIG_ERROR
        },
        ReplayError::Tick(TickError::Observation(ObservationError::MissingRecording {
            ..
        })) => codes::REPLAY_INPUT_ERROR,
        ReplayError::Tick(tick) => tick_code(tick),
        _ => codes::RUNTIME_ERROR,
    }
}
