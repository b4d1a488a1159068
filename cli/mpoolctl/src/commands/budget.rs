//! Budget command (show rolling-update budgets per pool).

use anyhow::Result;
use clap::Args;
use mpool_reconcile::{
    disruption_budget, machines_without_latest_model, ready_machines, MachinePool,
};
use serde::Serialize;
use tabled::Tabled;

use super::{CommandContext, SnapshotArgs};
use crate::error::CliError;
use crate::output::print_output;

/// Budget command - show how much disruption each pool allows right now.
#[derive(Debug, Args)]
pub struct BudgetCommand {
    #[command(flatten)]
    snapshot: SnapshotArgs,
}

#[derive(Debug, Serialize, Tabled)]
#[serde(rename_all = "camelCase")]
struct PoolBudget {
    #[tabled(rename = "Pool")]
    pool: String,
    #[tabled(rename = "Desired")]
    desired: u32,
    #[tabled(rename = "Ready")]
    ready: usize,
    #[tabled(rename = "Old Model")]
    without_latest_model: usize,
    #[tabled(rename = "Max Unavailable")]
    max_unavailable: i64,
    #[tabled(rename = "Disruption Budget")]
    disruption_budget: i64,
    #[tabled(rename = "Max Surge")]
    max_surge: i64,
    #[tabled(rename = "Requeue")]
    requeue: bool,
}

impl BudgetCommand {
    pub fn run(self, ctx: &CommandContext) -> Result<()> {
        let pools = self.snapshot.load_pools()?;
        let rows = pools
            .iter()
            .map(pool_budget)
            .collect::<Result<Vec<_>>>()?;

        print_output(&rows, ctx.format);
        Ok(())
    }
}

fn pool_budget(pool: &MachinePool) -> Result<PoolBudget> {
    let strategy_error = |source| CliError::Strategy {
        pool: pool.name.clone(),
        source,
    };

    let machines = pool.machines_by_provider_id();
    let desired = pool.desired_replicas();
    let ready = ready_machines(&machines).len();

    let max_unavailable = match pool.delete_selector() {
        Some(selector) => selector.max_unavailable(desired).map_err(strategy_error)?,
        None => 0,
    };
    let max_surge = pool.max_surge().map_err(strategy_error)?;

    Ok(PoolBudget {
        pool: pool.name.clone(),
        desired,
        ready,
        without_latest_model: machines_without_latest_model(&machines).len(),
        max_unavailable,
        disruption_budget: disruption_budget(ready, desired, max_unavailable),
        max_surge,
        requeue: pool.needs_requeue(),
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use mpool_reconcile::{
        DeploymentStrategy, IntOrString, Machine, ProvisioningState, RollingUpdate,
    };

    use super::*;

    #[test]
    fn test_pool_budget() {
        let machines = (0..4)
            .map(|i| {
                Machine::new(
                    format!("vm-{i}"),
                    Utc.with_ymd_and_hms(2024, 1, 1, i, 0, 0).unwrap(),
                )
                .with_state(ProvisioningState::Succeeded)
                .with_ready(true)
                .with_latest_model(i % 2 == 0)
            })
            .collect();
        let pool = MachinePool {
            name: "workers".to_string(),
            replicas: Some(4),
            strategy: Some(DeploymentStrategy::rolling_update(RollingUpdate {
                max_surge: Some("25%".into()),
                max_unavailable: Some(IntOrString::from("50%")),
                delete_policy: None,
            })),
            provisioning_state: Some(ProvisioningState::Succeeded),
            machines,
            ..Default::default()
        };

        let budget = pool_budget(&pool).unwrap();
        assert_eq!(budget.desired, 4);
        assert_eq!(budget.ready, 4);
        assert_eq!(budget.without_latest_model, 2);
        assert_eq!(budget.max_unavailable, 2);
        assert_eq!(budget.disruption_budget, 2);
        assert_eq!(budget.max_surge, 1);
        assert!(budget.requeue);
    }
}
