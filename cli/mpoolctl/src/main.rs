//! mpoolctl - CLI for machine pool snapshots
//!
//! Shows which machines a pool's rolling-update strategy would delete, the
//! budgets behind that decision, and whether strategies are valid.

use anyhow::Result;
use clap::Parser;

mod commands;
mod error;
mod output;

use commands::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = cli.run() {
        error::print_error(&e);
        std::process::exit(1);
    }

    Ok(())
}
