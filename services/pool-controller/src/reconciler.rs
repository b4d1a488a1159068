//! Machine pool reconciler.
//!
//! The reconciler is responsible for:
//! - Reading every pool through the pool client
//! - Deleting machines whose instance is gone at the provider
//! - Holding off while the provider or an autoscaler owns the pool
//! - Selecting machines to delete with the pool's deployment strategy
//! - Requesting deletion of the selected machines, in order

use std::sync::Arc;

use mpool_reconcile::{DeleteSelector, MachinePool};
use tracing::{debug, info, instrument, warn};

use crate::client::MachinePoolClient;
use crate::error::{ControllerError, ControllerResult};

/// Why a pool was left alone this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A long-running provider operation on the pool is in flight.
    OperationInProgress,

    /// An external autoscaler owns scale down.
    ReplicasExternallyManaged,

    /// The pool has no strategy that selects machines.
    NoDeleteSelector,

    /// The pool strategy does not validate.
    InvalidStrategy,
}

/// Result of reconciling one pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolOutcome {
    Skipped(SkipReason),
    Reconciled {
        /// Provider IDs deleted, in order.
        deleted: Vec<String>,
        /// The pool has not converged yet.
        requeue: bool,
    },
}

/// Statistics from a reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileStats {
    pub pools_processed: usize,
    pub pools_failed: usize,
    pub pools_skipped: usize,
    pub pools_requeued: usize,
    pub machines_deleted: usize,
}

/// The machine pool reconciler.
pub struct PoolReconciler<C> {
    client: Arc<C>,
}

impl<C: MachinePoolClient> PoolReconciler<C> {
    /// Create a new pool reconciler.
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    /// Run a single reconciliation pass for all pools.
    ///
    /// A failing pool is logged and counted; it never stops the others.
    #[instrument(skip(self))]
    pub async fn reconcile_all(&self) -> ControllerResult<ReconcileStats> {
        let mut stats = ReconcileStats::default();

        let pools = self.client.list_pools().await?;
        debug!(pool_count = pools.len(), "Found pools to reconcile");

        for pool in &pools {
            match self.reconcile_pool(pool).await {
                Ok(PoolOutcome::Skipped(_)) => {
                    stats.pools_skipped += 1;
                }
                Ok(PoolOutcome::Reconciled { deleted, requeue }) => {
                    stats.pools_processed += 1;
                    stats.machines_deleted += deleted.len();
                    if requeue {
                        stats.pools_requeued += 1;
                    }
                }
                Err(e) => {
                    warn!(pool = %pool.name, error = %e, "Failed to reconcile pool");
                    stats.pools_failed += 1;
                }
            }
        }

        info!(
            pools_processed = stats.pools_processed,
            pools_failed = stats.pools_failed,
            pools_skipped = stats.pools_skipped,
            pools_requeued = stats.pools_requeued,
            machines_deleted = stats.machines_deleted,
            "Reconciliation pass complete"
        );

        Ok(stats)
    }

    /// Reconcile a single pool.
    ///
    /// Machines gone at the provider are cleaned up first; if any were, the
    /// pass ends there and selection waits for the next one.
    #[instrument(
        skip(self, pool),
        fields(pool = %pool.name, desired_replicas = pool.desired_replicas())
    )]
    pub async fn reconcile_pool(&self, pool: &MachinePool) -> ControllerResult<PoolOutcome> {
        let missing = pool.machines_missing_from_provider();
        if !missing.is_empty() {
            let mut deleted = Vec::with_capacity(missing.len());
            for machine in missing {
                debug!(
                    provider_id = %machine.provider_id,
                    "Deleting machine because it no longer exists at the provider"
                );
                self.client
                    .delete_machine(&pool.name, &machine.provider_id)
                    .await?;
                deleted.push(machine.provider_id.clone());
            }

            debug!(
                deleted = deleted.len(),
                "Exiting early after deleting machines that no longer exist at the provider"
            );
            return Ok(PoolOutcome::Reconciled {
                deleted,
                requeue: true,
            });
        }

        if pool.operation_in_progress {
            debug!("Exiting early due to an in-progress long running operation on the pool");
            return Ok(PoolOutcome::Skipped(SkipReason::OperationInProgress));
        }

        if pool.replicas_externally_managed {
            debug!("Exiting early due to replicas externally managed");
            return Ok(PoolOutcome::Skipped(SkipReason::ReplicasExternallyManaged));
        }

        let Some(selector) = pool.delete_selector() else {
            debug!("Cannot select machines to delete because no deployment strategy is specified");
            return Ok(PoolOutcome::Skipped(SkipReason::NoDeleteSelector));
        };

        if let Some(Err(e)) = pool.strategy.as_ref().map(|s| s.validate()) {
            warn!(error = %e, "Skipping pool with an invalid deployment strategy");
            return Ok(PoolOutcome::Skipped(SkipReason::InvalidStrategy));
        }

        let machines = pool.machines_by_provider_id();
        let to_delete = selector
            .select_machines_to_delete(pool.desired_replicas(), &machines)
            .map_err(|source| ControllerError::Selection {
                pool: pool.name.clone(),
                source,
            })?;

        let mut deleted = Vec::with_capacity(to_delete.len());
        for machine in &to_delete {
            info!(provider_id = %machine.provider_id, "Deleting selected machine");
            self.client
                .delete_machine(&pool.name, &machine.provider_id)
                .await?;
            deleted.push(machine.provider_id.clone());
        }

        let requeue = !deleted.is_empty() || pool.needs_requeue();
        debug!(deleted = deleted.len(), requeue, "Done reconciling pool machines");

        Ok(PoolOutcome::Reconciled { deleted, requeue })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{TimeZone, Utc};
    use mpool_reconcile::{DeploymentStrategy, Machine, ProvisioningState, RollingUpdate};

    use super::*;
    use crate::client::InMemoryPoolClient;

    fn failed_pool() -> MachinePool {
        MachinePool {
            name: "workers".to_string(),
            replicas: Some(1),
            strategy: Some(DeploymentStrategy::rolling_update(RollingUpdate::default())),
            machines: vec![Machine::new(
                "vm-0",
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            )
            .with_state(ProvisioningState::Failed)],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_skip_reasons_take_precedence_in_order() {
        let client = InMemoryPoolClient::new(Vec::<MachinePool>::new());
        let reconciler = PoolReconciler::new(Arc::new(client));

        let mut pool = failed_pool();
        pool.operation_in_progress = true;
        pool.replicas_externally_managed = true;
        assert_eq!(
            reconciler.reconcile_pool(&pool).await.unwrap(),
            PoolOutcome::Skipped(SkipReason::OperationInProgress)
        );

        pool.operation_in_progress = false;
        assert_eq!(
            reconciler.reconcile_pool(&pool).await.unwrap(),
            PoolOutcome::Skipped(SkipReason::ReplicasExternallyManaged)
        );

        pool.replicas_externally_managed = false;
        pool.strategy = None;
        assert_eq!(
            reconciler.reconcile_pool(&pool).await.unwrap(),
            PoolOutcome::Skipped(SkipReason::NoDeleteSelector)
        );
    }

    #[tokio::test]
    async fn test_failed_machine_deleted() {
        let client = Arc::new(InMemoryPoolClient::new([failed_pool()]));
        let reconciler = PoolReconciler::new(Arc::clone(&client));

        let outcome = reconciler.reconcile_pool(&failed_pool()).await.unwrap();
        assert_eq!(
            outcome,
            PoolOutcome::Reconciled {
                deleted: vec!["vm-0".to_string()],
                requeue: true,
            }
        );

        let pool = client.pool("workers").await.unwrap();
        assert!(pool.machines[0].is_marked_for_deletion());
    }

    #[tokio::test]
    async fn test_delete_failure_fails_pool() {
        let client = Arc::new(InMemoryPoolClient::failing([failed_pool()]));
        let reconciler = PoolReconciler::new(client);

        let err = reconciler.reconcile_pool(&failed_pool()).await.unwrap_err();
        assert!(matches!(
            err,
            ControllerError::Delete { ref provider_id, .. } if provider_id == "vm-0"
        ));
    }

    #[tokio::test]
    async fn test_invalid_strategy_skips_pool() {
        let mut pool = failed_pool();
        pool.strategy = Some(DeploymentStrategy::rolling_update(RollingUpdate {
            max_unavailable: Some("half".into()),
            ..Default::default()
        }));
        let client = Arc::new(InMemoryPoolClient::new([pool.clone()]));
        let reconciler = PoolReconciler::new(Arc::clone(&client));

        assert_eq!(
            reconciler.reconcile_pool(&pool).await.unwrap(),
            PoolOutcome::Skipped(SkipReason::InvalidStrategy)
        );
        let stored = client.pool("workers").await.unwrap();
        assert!(!stored.machines[0].is_marked_for_deletion());
    }

    #[tokio::test]
    async fn test_missing_machines_cleaned_up_before_gates() {
        let mut pool = failed_pool();
        pool.operation_in_progress = true;
        pool.machines.push(Machine::new(
            "vm-1",
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        ));
        pool.provider_instances = Some(BTreeSet::from(["vm-1".to_string()]));

        let client = Arc::new(InMemoryPoolClient::new([pool.clone()]));
        let reconciler = PoolReconciler::new(Arc::clone(&client));

        assert_eq!(
            reconciler.reconcile_pool(&pool).await.unwrap(),
            PoolOutcome::Reconciled {
                deleted: vec!["vm-0".to_string()],
                requeue: true,
            }
        );
    }
}
