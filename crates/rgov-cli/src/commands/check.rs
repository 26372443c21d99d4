//! `rgov check`: validate a configuration and print the admission summary.

use std::path::PathBuf;

use clap::Args;
use rgov_daemon::DaemonConfig;

use crate::exit_codes::CommandError;

/// Validate a configuration without touching any cgroup.
#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Path to the TOML configuration.
    #[arg(long, short = 'c', env = "RGOV_CONFIG")]
    pub config: PathBuf,

    /// Print the admission summary as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Executes the check command.
///
/// # Errors
///
/// Returns [`CommandError`] when the configuration is unreadable or fails
/// admission.
pub fn execute(args: &CheckArgs) -> Result<(), CommandError> {
    let config = DaemonConfig::load(&args.config)?;
    let governor = &config.governor;
    let total_us = governor
        .total_budget_us()
        .map_err(rgov_daemon::ConfigFileError::from)?;

    if args.json {
        let summary = serde_json::json!({
            "window_us": governor.window_us,
            "capacity_us": governor.capacity_us,
            "total_budget_us": total_us,
            "workloads": governor.workloads.iter().map(|spec| {
                serde_json::json!({
                    "id": spec.id.as_str(),
                    "budget_us": spec.budget_us,
                    "cgroup": spec.cgroup,
                })
            }).collect::<Vec<_>>(),
        });
        println!("{summary}");
    } else {
        println!(
            "config ok: {} workloads, {} of {} us/window declared, window {} us",
            governor.workloads.len(),
            total_us,
            governor.capacity_us,
            governor.window_us,
        );
        for spec in &governor.workloads {
            println!(
                "  {:<20} budget {:>12} us  cgroup {}",
                spec.id,
                spec.budget_us,
                spec.cgroup.display(),
            );
        }
    }
    Ok(())
}
