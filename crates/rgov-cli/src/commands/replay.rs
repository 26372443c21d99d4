//! `rgov replay`: verify a recorded decision log offline.
//!
//! Reconstructs the decision stream from the log's recorded observations
//! and the configuration, and demands byte-equality against the recording.
//! No kernel, no clock, no sleeping.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use rgov_core::verify_replay;
use rgov_daemon::DaemonConfig;

use crate::exit_codes::CommandError;

/// Replay and verify a recorded decision log.
#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Path to the TOML configuration the log was recorded under.
    #[arg(long, short = 'c', env = "RGOV_CONFIG")]
    pub config: PathBuf,

    /// Decision log to verify. Defaults to the config's `decision_log`.
    #[arg(long)]
    pub log: Option<PathBuf>,

    /// Write the reconstructed stream to this path (mainly for diffing a
    /// divergent log by hand).
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Executes the replay command.
///
/// # Errors
///
/// Returns [`CommandError`] when the inputs cannot be read or the
/// reconstruction diverges from the recording.
pub fn execute(args: &ReplayArgs) -> Result<(), CommandError> {
    let config = DaemonConfig::load(&args.config)?;
    let log_path = args.log.clone().unwrap_or_else(|| config.decision_log.clone());
    let log = fs::read_to_string(&log_path).map_err(|source| CommandError::Io {
        context: format!("reading decision log {}", log_path.display()),
        source,
    })?;

    let outcome = verify_replay(&config.governor, log.trim_end())?;

    if let Some(output) = &args.output {
        let mut lines = outcome.canonical_lines().join("\n");
        lines.push('\n');
        fs::write(output, lines).map_err(|source| CommandError::Io {
            context: format!("writing reconstruction {}", output.display()),
            source,
        })?;
    }

    println!(
        "replay verified: {} records across {} workloads are byte-identical",
        outcome.records.len(),
        config.governor.workloads.len(),
    );
    Ok(())
}
