//! `rgov`: deterministic user-space CPU governor for Linux cgroups.
//!
//! Subcommands:
//!
//! - `rgov run --config rgov.toml`: govern live workloads
//! - `rgov replay --config rgov.toml`: verify a recorded decision log
//! - `rgov check --config rgov.toml`: validate a configuration
//!
//! Exit codes are deterministic (see `exit_codes`); failures additionally
//! print one machine-readable JSON object on stderr.

use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;
mod exit_codes;

use commands::check::CheckArgs;
use commands::replay::ReplayArgs;
use commands::run::RunArgs;
use exit_codes::CommandError;

/// Deterministic CPU resource governor.
#[derive(Debug, Parser)]
#[command(name = "rgov", version, about = "Deterministic CPU resource governor for Linux cgroups")]
struct Cli {
    /// Log level filter when RUST_LOG is unset.
    #[arg(long, env = "RGOV_LOG", default_value = "info", global = true)]
    log_level: String,

    /// Emit human-readable logs as JSON lines on stderr.
    ///
    /// Affects only the diagnostic sink; the decision log format never
    /// changes.
    #[arg(long, env = "RGOV_LOG_JSON", global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Govern live workloads from a configuration file.
    Run(RunArgs),

    /// Replay a recorded decision log and verify byte-equality.
    Replay(ReplayArgs),

    /// Validate a configuration and print the admission summary.
    Check(CheckArgs),
}

fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&cli.log_level))
        .context("invalid log level filter")?;

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_tracing(&cli) {
        eprintln!("{err:#}");
        return ExitCode::from(exit_codes::codes::RUNTIME_ERROR);
    }

    let result: Result<(), CommandError> = match cli.command {
        Command::Run(args) => commands::run::execute(args).await,
        Command::Replay(args) => commands::replay::execute(&args),
        Command::Check(args) => commands::check::execute(&args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let reason = serde_json::json!({
                "error": err.kind(),
                "message": err.to_string(),
            });
            eprintln!("{reason}");
            ExitCode::from(err.exit_code())
        },
    }
}
