//! Error handling and display for the CLI.

use colored::Colorize;
use mpool_reconcile::{SnapshotError, StrategyError};
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Pool not found in snapshot: {0}")]
    PoolNotFound(String),

    #[error("Invalid snapshot: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Strategy for pool {pool} could not be evaluated")]
    Strategy {
        pool: String,
        #[source]
        source: StrategyError,
    },

    #[error("{count} pool(s) have an invalid strategy")]
    InvalidStrategies { count: usize },
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    for cause in err.chain().skip(1) {
        eprintln!("  {} {}", "caused by:".dimmed(), cause);
    }

    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        match cli_err {
            CliError::PoolNotFound(_) => {
                eprintln!(
                    "\n{}",
                    "Hint: Omit --pool to list every pool in the snapshot.".yellow()
                );
            }
            CliError::Strategy { source, .. } if source.is_resolution_error() => {
                eprintln!(
                    "\n{}",
                    "Hint: Percentages must look like \"25%\"; plain numbers must not be quoted."
                        .yellow()
                );
            }
            CliError::InvalidStrategies { .. } => {
                eprintln!(
                    "\n{}",
                    "Hint: maxSurge and maxUnavailable cannot both be 0.".yellow()
                );
            }
            _ => {}
        }
    }
}
