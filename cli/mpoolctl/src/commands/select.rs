//! Select command (show machines to delete).

use anyhow::Result;
use clap::Args;
use mpool_reconcile::{Machine, MachinePool};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::Serialize;
use tabled::Tabled;

use super::{CommandContext, SnapshotArgs};
use crate::error::CliError;
use crate::output::{print_info, print_output, OutputFormat};

/// Select command - run the pool strategy against a snapshot.
#[derive(Debug, Args)]
pub struct SelectCommand {
    #[command(flatten)]
    snapshot: SnapshotArgs,

    /// Seed for random delete ordering, for reproducible output.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, Serialize, Tabled)]
#[serde(rename_all = "camelCase")]
struct SelectedMachine {
    #[tabled(rename = "Pool")]
    pool: String,
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "Provider ID")]
    provider_id: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Ready")]
    ready: bool,
    #[tabled(rename = "Latest Model")]
    latest_model: bool,
    #[tabled(rename = "Annotated")]
    annotated: bool,
}

impl SelectedMachine {
    fn new(pool: &str, position: usize, machine: &Machine) -> Self {
        Self {
            pool: pool.to_string(),
            position,
            provider_id: machine.provider_id.clone(),
            created: machine.creation_timestamp.to_rfc3339(),
            state: machine
                .provisioning_state()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
            ready: machine.status.ready,
            latest_model: machine.status.latest_model_applied,
            annotated: machine.has_delete_annotation(),
        }
    }
}

impl SelectCommand {
    pub fn run(self, ctx: &CommandContext) -> Result<()> {
        let pools = self.snapshot.load_pools()?;
        let mut rng: Box<dyn RngCore> = match self.seed {
            Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
            None => Box::new(rand::rng()),
        };

        let mut rows = Vec::new();
        for pool in &pools {
            match select_for_pool(pool, &mut *rng)? {
                Some(selected) => rows.extend(
                    selected
                        .iter()
                        .enumerate()
                        .map(|(i, m)| SelectedMachine::new(&pool.name, i + 1, m)),
                ),
                None if ctx.format == OutputFormat::Table => print_info(&format!(
                    "Pool {} has no deployment strategy that selects machines",
                    pool.name
                )),
                None => {}
            }
        }

        print_output(&rows, ctx.format);
        Ok(())
    }
}

/// Machines the pool's strategy would delete, or `None` without a selector.
fn select_for_pool(pool: &MachinePool, rng: &mut dyn RngCore) -> Result<Option<Vec<Machine>>> {
    let Some(selector) = pool.delete_selector() else {
        return Ok(None);
    };

    let selected = selector
        .select_machines_to_delete_with_rng(
            pool.desired_replicas(),
            &pool.machines_by_provider_id(),
            rng,
        )
        .map_err(|source| CliError::Strategy {
            pool: pool.name.clone(),
            source,
        })?;
    Ok(Some(selected))
}
