//! Machine pool snapshots.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::classify::MachinesByProviderId;
use crate::error::StrategyError;
use crate::machine::{Machine, ProvisioningState};
use crate::strategy::{DeploymentStrategy, RollingUpdateStrategy, Surger};

/// A machine pool as observed by the reconciler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachinePool {
    pub name: String,

    /// Desired replica count; unset means zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<DeploymentStrategy>,

    /// An external autoscaler owns scale down.
    #[serde(default)]
    pub replicas_externally_managed: bool,

    /// A long-running provider operation on the pool is in flight.
    #[serde(default)]
    pub operation_in_progress: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<ProvisioningState>,

    #[serde(default)]
    pub machines: Vec<Machine>,

    /// Provider IDs of the instances the provider currently reports.
    ///
    /// `None` when the snapshot carries no separate provider view; the
    /// machine list is then taken as the provider's view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_instances: Option<BTreeSet<String>>,
}

impl MachinePool {
    pub fn desired_replicas(&self) -> u32 {
        self.replicas.unwrap_or(0)
    }

    /// Machines keyed by provider ID, as the selection policy sees them.
    ///
    /// A delete annotation set on the owning machine is copied onto machines
    /// that do not carry one yet.
    pub fn machines_by_provider_id(&self) -> MachinesByProviderId {
        self.machines
            .iter()
            .map(|m| {
                let mut machine = m.clone();
                if machine.inherit_owner_delete_annotation() {
                    debug!(
                        pool = %self.name,
                        provider_id = %machine.provider_id,
                        "Fetched delete annotation from owner machine"
                    );
                }
                (machine.provider_id.clone(), machine)
            })
            .collect()
    }

    /// Machines whose instance no longer exists at the provider and that are
    /// not yet marked for deletion, in provider-ID order.
    ///
    /// Empty without a provider view.
    pub fn machines_missing_from_provider(&self) -> Vec<&Machine> {
        let Some(instances) = &self.provider_instances else {
            return Vec::new();
        };

        let mut missing: Vec<&Machine> = self
            .machines
            .iter()
            .filter(|m| !m.is_marked_for_deletion() && !instances.contains(&m.provider_id))
            .collect();
        missing.sort_by(|a, b| a.provider_id.cmp(&b.provider_id));
        missing
    }

    pub fn delete_selector(&self) -> Option<RollingUpdateStrategy> {
        self.strategy.as_ref().and_then(DeploymentStrategy::delete_selector)
    }

    /// Machines to surge during an update, or 0 without a surging strategy.
    pub fn max_surge(&self) -> Result<i64, StrategyError> {
        match self.delete_selector() {
            Some(selector) => selector.surge(self.desired_replicas()),
            None => Ok(0),
        }
    }

    /// Instances currently backing the pool.
    ///
    /// The provider's instance count when the snapshot has a provider view,
    /// otherwise the machines not yet marked for deletion or deleted.
    pub fn live_machine_count(&self) -> usize {
        if let Some(instances) = &self.provider_instances {
            return instances.len();
        }

        self.machines
            .iter()
            .filter(|m| !m.is_marked_for_deletion() && !m.is_in_state(ProvisioningState::Deleted))
            .count()
    }

    /// Returns true if the pool should be reconciled again soon.
    ///
    /// Provider state is always known here: without a provider view the
    /// machine list stands in for it (see [`MachinePool::provider_instances`]).
    pub fn needs_requeue(&self) -> bool {
        if self.machines.iter().any(|m| !m.status.latest_model_applied) {
            return true;
        }

        let terminal = self
            .provisioning_state
            .is_some_and(|state| state.is_terminal());
        let desired_matches_actual = self.live_machine_count() == self.desired_replicas() as usize;
        !(terminal && desired_matches_actual)
    }
}

/// Snapshot file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Json,
    Toml,
}

impl SnapshotFormat {
    /// Guess the format from a file extension; anything but `.toml` is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

/// Errors parsing a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("invalid JSON snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML snapshot: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("duplicate provider ID {provider_id} in pool {pool}")]
    DuplicateProviderId { pool: String, provider_id: String },
}

/// A set of machine pools loaded from a file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    #[serde(default)]
    pub pools: Vec<MachinePool>,
}

impl PoolSnapshot {
    /// Parse a snapshot and fill every pool strategy with its defaults.
    pub fn parse(contents: &str, format: SnapshotFormat) -> Result<Self, SnapshotError> {
        let mut snapshot: Self = match format {
            SnapshotFormat::Json => serde_json::from_str(contents)?,
            SnapshotFormat::Toml => toml::from_str(contents)?,
        };
        snapshot.check_unique_provider_ids()?;

        for pool in &mut snapshot.pools {
            pool.strategy = pool.strategy.take().map(DeploymentStrategy::with_defaults);
        }
        Ok(snapshot)
    }

    pub fn pool(&self, name: &str) -> Option<&MachinePool> {
        self.pools.iter().find(|p| p.name == name)
    }

    fn check_unique_provider_ids(&self) -> Result<(), SnapshotError> {
        for pool in &self.pools {
            let mut seen = HashSet::new();
            for machine in &pool.machines {
                if !seen.insert(machine.provider_id.as_str()) {
                    return Err(SnapshotError::DuplicateProviderId {
                        pool: pool.name.clone(),
                        provider_id: machine.provider_id.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
