//! CLI commands.

mod budget;
mod select;
mod validate;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mpool_reconcile::{MachinePool, PoolSnapshot, SnapshotFormat};
use tracing_subscriber::EnvFilter;

use crate::error::CliError;
use crate::output::OutputFormat;

/// mpoolctl - Inspect machine pool snapshots and rolling-update decisions.
#[derive(Debug, Parser)]
#[command(name = "mpoolctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (table or json).
    #[arg(long, global = true, default_value = "table")]
    format: String,

    /// Log selection decisions to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show the machines each pool would delete this pass.
    Select(select::SelectCommand),

    /// Show unavailability, disruption and surge budgets.
    Budget(budget::BudgetCommand),

    /// Validate pool deployment strategies.
    Validate(validate::ValidateCommand),
}

impl Cli {
    /// Run the CLI command.
    pub fn run(self) -> Result<()> {
        if self.verbose {
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new("mpool_reconcile=debug"))
                .with_writer(std::io::stderr)
                .init();
        }

        let ctx = CommandContext {
            format: OutputFormat::parse(&self.format),
        };

        match self.command {
            Commands::Select(cmd) => cmd.run(&ctx),
            Commands::Budget(cmd) => cmd.run(&ctx),
            Commands::Validate(cmd) => cmd.run(&ctx),
        }
    }
}

/// Context shared by commands.
pub struct CommandContext {
    pub format: OutputFormat,
}

/// Snapshot arguments shared by commands.
#[derive(Debug, Args)]
pub struct SnapshotArgs {
    /// Snapshot file (JSON, or TOML with a .toml extension).
    snapshot: PathBuf,

    /// Only this pool.
    #[arg(long)]
    pool: Option<String>,
}

impl SnapshotArgs {
    /// Load the snapshot and pick the requested pools.
    pub fn load_pools(&self) -> Result<Vec<MachinePool>> {
        let snapshot = load_snapshot(&self.snapshot)?;
        select_pools(snapshot, self.pool.as_deref())
    }
}

fn load_snapshot(path: &Path) -> Result<PoolSnapshot> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    let snapshot = PoolSnapshot::parse(&contents, SnapshotFormat::from_path(path))
        .map_err(CliError::from)?;
    Ok(snapshot)
}

fn select_pools(snapshot: PoolSnapshot, name: Option<&str>) -> Result<Vec<MachinePool>> {
    let Some(name) = name else {
        return Ok(snapshot.pools);
    };

    let pool = snapshot
        .pools
        .into_iter()
        .find(|p| p.name == name)
        .ok_or_else(|| CliError::PoolNotFound(name.to_string()))?;
    Ok(vec![pool])
}
