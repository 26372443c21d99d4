//! `rgov run`: govern live workloads from a configuration file.

use std::path::PathBuf;

use clap::Args;
use rgov_daemon::{DaemonConfig, DriverOptions};

use crate::exit_codes::CommandError;

/// Run the governor against live cgroups.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Path to the TOML configuration.
    #[arg(long, short = 'c', env = "RGOV_CONFIG")]
    pub config: PathBuf,

    /// Stop cleanly after this many windows instead of running until a
    /// signal.
    #[arg(long)]
    pub max_windows: Option<u64>,
}

/// Executes the run command.
///
/// # Errors
///
/// Returns [`CommandError`] on configuration failure, startup failure, or
/// the first fatal tick error.
pub async fn execute(args: RunArgs) -> Result<(), CommandError> {
    let config = DaemonConfig::load(&args.config)?;
    let summary = rgov_daemon::run(
        &config,
        DriverOptions {
            max_windows: args.max_windows,
        },
    )
    .await?;
    tracing::info!(
        windows = summary.windows,
        enforcement_failures = summary.enforcement_failures,
        "governor stopped cleanly"
    );
    Ok(())
}
