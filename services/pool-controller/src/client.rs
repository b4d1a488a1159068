//! Access to machine pools and the deletion executor.
//!
//! The reconciler only talks to pools through [`MachinePoolClient`]. A
//! provider-backed client lives outside this crate; [`InMemoryPoolClient`]
//! backs the binary in dev mode and the tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use mpool_reconcile::MachinePool;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{ControllerError, ControllerResult};

/// Reads pools and requests machine deletion.
#[async_trait]
pub trait MachinePoolClient: Send + Sync {
    /// Snapshot every pool.
    async fn list_pools(&self) -> ControllerResult<Vec<MachinePool>>;

    /// Request deletion of one machine.
    ///
    /// Must be idempotent: deleting a machine already marked for deletion
    /// succeeds.
    async fn delete_machine(&self, pool: &str, provider_id: &str) -> ControllerResult<()>;
}

/// In-memory pool client.
///
/// Deletion marks the machine's deletion timestamp; the machine stays in the
/// pool until something else removes it.
pub struct InMemoryPoolClient {
    pools: RwLock<BTreeMap<String, MachinePool>>,

    /// Whether deletions should "fail".
    fail_deletes: bool,
}

impl InMemoryPoolClient {
    /// Create a client holding the given pools.
    pub fn new(pools: impl IntoIterator<Item = MachinePool>) -> Self {
        Self {
            pools: RwLock::new(pools.into_iter().map(|p| (p.name.clone(), p)).collect()),
            fail_deletes: false,
        }
    }

    /// Create a client that fails every deletion.
    pub fn failing(pools: impl IntoIterator<Item = MachinePool>) -> Self {
        Self {
            fail_deletes: true,
            ..Self::new(pools)
        }
    }

    /// Current state of a pool.
    pub async fn pool(&self, name: &str) -> Option<MachinePool> {
        self.pools.read().await.get(name).cloned()
    }
}

#[async_trait]
impl MachinePoolClient for InMemoryPoolClient {
    async fn list_pools(&self) -> ControllerResult<Vec<MachinePool>> {
        Ok(self.pools.read().await.values().cloned().collect())
    }

    async fn delete_machine(&self, pool: &str, provider_id: &str) -> ControllerResult<()> {
        if self.fail_deletes {
            return Err(ControllerError::Delete {
                provider_id: provider_id.to_string(),
                message: "in-memory client configured to fail".to_string(),
            });
        }

        let mut pools = self.pools.write().await;
        let pool_state = pools
            .get_mut(pool)
            .ok_or_else(|| ControllerError::PoolNotFound(pool.to_string()))?;
        let machine = pool_state
            .machines
            .iter_mut()
            .find(|m| m.provider_id == provider_id)
            .ok_or_else(|| ControllerError::MachineNotFound {
                pool: pool.to_string(),
                provider_id: provider_id.to_string(),
            })?;

        if machine.is_marked_for_deletion() {
            debug!(pool, provider_id, "Machine already marked for deletion");
            return Ok(());
        }

        machine.deletion_timestamp = Some(Utc::now());
        info!(pool, provider_id, "[IN-MEMORY] Marked machine for deletion");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use mpool_reconcile::Machine;

    use super::*;

    fn test_pool() -> MachinePool {
        MachinePool {
            name: "workers".to_string(),
            replicas: Some(1),
            machines: vec![Machine::new(
                "vm-0",
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            )],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_delete_marks_machine() {
        let client = InMemoryPoolClient::new([test_pool()]);

        client.delete_machine("workers", "vm-0").await.unwrap();
        let pool = client.pool("workers").await.unwrap();
        assert!(pool.machines[0].is_marked_for_deletion());

        // Idempotent
        client.delete_machine("workers", "vm-0").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_unknown_machine() {
        let client = InMemoryPoolClient::new([test_pool()]);

        let err = client.delete_machine("workers", "vm-9").await.unwrap_err();
        assert!(matches!(err, ControllerError::MachineNotFound { .. }));

        let err = client.delete_machine("other", "vm-0").await.unwrap_err();
        assert!(matches!(err, ControllerError::PoolNotFound(_)));
    }

    #[tokio::test]
    async fn test_failing_client() {
        let client = InMemoryPoolClient::failing([test_pool()]);
        assert!(client.delete_machine("workers", "vm-0").await.is_err());
    }
}
