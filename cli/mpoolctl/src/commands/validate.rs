//! Validate command (check pool strategies).

use anyhow::Result;
use clap::Args;
use mpool_reconcile::MachinePool;
use serde::Serialize;
use tabled::Tabled;

use super::{CommandContext, SnapshotArgs};
use crate::error::CliError;
use crate::output::{print_output, print_success, OutputFormat};

/// Validate command - check every pool strategy resolves and allows progress.
#[derive(Debug, Args)]
pub struct ValidateCommand {
    #[command(flatten)]
    snapshot: SnapshotArgs,
}

#[derive(Debug, Serialize, Tabled)]
struct StrategyCheck {
    #[tabled(rename = "Pool")]
    pool: String,
    #[tabled(rename = "Valid")]
    valid: bool,
    #[tabled(rename = "Message")]
    message: String,
}

impl ValidateCommand {
    pub fn run(self, ctx: &CommandContext) -> Result<()> {
        let pools = self.snapshot.load_pools()?;
        let checks: Vec<StrategyCheck> = pools.iter().map(check_pool).collect();
        let invalid = checks.iter().filter(|c| !c.valid).count();

        print_output(&checks, ctx.format);

        if invalid > 0 {
            return Err(CliError::InvalidStrategies { count: invalid }.into());
        }
        if ctx.format == OutputFormat::Table {
            print_success(&format!("{} pool(s) valid", checks.len()));
        }
        Ok(())
    }
}

fn check_pool(pool: &MachinePool) -> StrategyCheck {
    let result = match &pool.strategy {
        Some(strategy) => strategy.validate().map(|_| "ok".to_string()),
        None => Ok("no strategy; machines are never selected".to_string()),
    };

    match result {
        Ok(message) => StrategyCheck {
            pool: pool.name.clone(),
            valid: true,
            message,
        },
        Err(e) => StrategyCheck {
            pool: pool.name.clone(),
            valid: false,
            message: e.to_string(),
        },
    }
}
