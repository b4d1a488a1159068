//! Rolling-update deployment strategy and machine selection.
//!
//! The selection is a single stateless pass run once per reconciliation. It
//! decides which machines to delete, in order, from a snapshot of the pool:
//!
//! 1. Failed and deleting machines, unconditionally.
//! 2. Machines annotated for deletion, unconditionally.
//! 3. Nothing while the pool has fewer ready machines than desired.
//! 4. Excess ready capacity, preferring machines on an old model.
//! 5. Nothing when every machine runs the latest model.
//! 6. Nothing when the disruption budget is exhausted.
//! 7. Old-model ready machines, up to the disruption budget.

use std::collections::HashSet;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classify::{Classification, MachinesByProviderId};
use crate::error::StrategyError;
use crate::intstr::IntOrString;
use crate::machine::Machine;
use crate::order::{order_by_delete_annotation, order_machines, DeletePolicy};

/// Default max surge when unset.
pub const DEFAULT_MAX_SURGE: i32 = 1;

/// Default max unavailable when unset.
pub const DEFAULT_MAX_UNAVAILABLE: i32 = 0;

/// Default delete policy when unset.
pub const DEFAULT_DELETE_POLICY: DeletePolicy = DeletePolicy::Oldest;

/// Replica count used to judge percentage values during validation.
const VALIDATION_SCALE: u32 = 100;

/// Chooses machines to delete from a pool.
pub trait DeleteSelector: Send + Sync {
    /// Return the machines to delete this pass, in deletion order.
    fn select_machines_to_delete(
        &self,
        desired_replicas: u32,
        machines: &MachinesByProviderId,
    ) -> Result<Vec<Machine>, StrategyError>;
}

/// Computes how many machines may be created above the desired count.
pub trait Surger {
    fn surge(&self, desired_replicas: u32) -> Result<i64, StrategyError>;
}

/// Deployment strategy kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyType {
    #[default]
    RollingUpdate,

    /// Any other value. No machines are selected by the pool itself.
    #[serde(other)]
    Unsupported,
}

/// Rolling update parameters as authored by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingUpdate {
    /// Machines that may be created above the desired count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_surge: Option<IntOrString>,

    /// Machines that may be unavailable during the update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_unavailable: Option<IntOrString>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_policy: Option<DeletePolicy>,
}

impl RollingUpdate {
    /// Fill unset fields with their defaults.
    pub fn with_defaults(mut self) -> Self {
        self.max_surge
            .get_or_insert(IntOrString::Int(DEFAULT_MAX_SURGE));
        self.max_unavailable
            .get_or_insert(IntOrString::Int(DEFAULT_MAX_UNAVAILABLE));
        self.delete_policy.get_or_insert(DEFAULT_DELETE_POLICY);
        self
    }

    /// Check that the bounds resolve and allow progress.
    pub fn validate(&self) -> Result<(), StrategyError> {
        let surge = self
            .max_surge
            .clone()
            .unwrap_or(IntOrString::Int(DEFAULT_MAX_SURGE));
        let unavailable = self
            .max_unavailable
            .clone()
            .unwrap_or(IntOrString::Int(DEFAULT_MAX_UNAVAILABLE));

        let max_surge = surge
            .scaled_value(VALIDATION_SCALE, true)
            .map_err(StrategyError::MaxSurge)?;
        let max_unavailable = unavailable
            .scaled_value(VALIDATION_SCALE, true)
            .map_err(StrategyError::MaxUnavailable)?;

        if max_surge < 0 {
            return Err(StrategyError::Invalid(format!(
                "maxSurge must not be negative, got {surge}"
            )));
        }
        if max_unavailable < 0 {
            return Err(StrategyError::Invalid(format!(
                "maxUnavailable must not be negative, got {unavailable}"
            )));
        }
        if max_surge == 0 && max_unavailable == 0 {
            return Err(StrategyError::Invalid(
                "maxUnavailable must not be 0 if maxSurge is 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Deployment strategy attached to a machine pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStrategy {
    #[serde(rename = "type", default)]
    pub strategy_type: StrategyType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolling_update: Option<RollingUpdate>,
}

impl DeploymentStrategy {
    /// A rolling update strategy with the given parameters.
    pub fn rolling_update(rolling_update: RollingUpdate) -> Self {
        Self {
            strategy_type: StrategyType::RollingUpdate,
            rolling_update: Some(rolling_update),
        }
    }

    /// Build the selector for this strategy.
    ///
    /// Returns `None` for strategy types that do not select machines.
    pub fn delete_selector(&self) -> Option<RollingUpdateStrategy> {
        match self.strategy_type {
            StrategyType::RollingUpdate => Some(RollingUpdateStrategy::new(
                self.rolling_update.clone().unwrap_or_default(),
            )),
            StrategyType::Unsupported => None,
        }
    }

    /// Fill the strategy with defaults the way admission would.
    pub fn with_defaults(mut self) -> Self {
        if self.strategy_type == StrategyType::RollingUpdate {
            let rolling_update = self.rolling_update.take().unwrap_or_default();
            self.rolling_update = Some(rolling_update.with_defaults());
        }
        self
    }

    pub fn validate(&self) -> Result<(), StrategyError> {
        match (&self.strategy_type, &self.rolling_update) {
            (StrategyType::RollingUpdate, Some(rolling_update)) => rolling_update.validate(),
            (StrategyType::RollingUpdate, None) => Ok(()),
            (StrategyType::Unsupported, _) => Err(StrategyError::Invalid(
                "unsupported deployment strategy type".to_string(),
            )),
        }
    }
}

/// Rolling update selector for a machine pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollingUpdateStrategy {
    spec: RollingUpdate,
}

impl RollingUpdateStrategy {
    pub fn new(spec: RollingUpdate) -> Self {
        Self { spec }
    }

    /// Maximum machines that may be unavailable at once.
    ///
    /// Unset means no voluntary disruption. Percentages round down.
    pub fn max_unavailable(&self, desired_replicas: u32) -> Result<i64, StrategyError> {
        match &self.spec.max_unavailable {
            Some(value) => value
                .scaled_value(desired_replicas, false)
                .map_err(StrategyError::MaxUnavailable),
            None => Ok(0),
        }
    }

    /// Select machines to delete using the given random source for
    /// random ordering.
    pub fn select_machines_to_delete_with_rng<R>(
        &self,
        desired_replicas: u32,
        machines: &MachinesByProviderId,
        rng: &mut R,
    ) -> Result<Vec<Machine>, StrategyError>
    where
        R: Rng + ?Sized,
    {
        let max_unavailable = self.max_unavailable(desired_replicas)?;
        let policy = self.spec.delete_policy;
        let mut order = |subset: Vec<Machine>| order_machines(subset, policy, &mut *rng);

        let classes = Classification::from_machines(machines);
        let delete_annotated = order(classes.delete_annotated);
        let mut failed = order(classes.failed);
        order_by_delete_annotation(&mut failed);
        let mut deleting = order(classes.deleting);
        order_by_delete_annotation(&mut deleting);
        let ready = order(classes.ready);
        let without_latest_model = order(classes.without_latest_model);

        let desired = i64::from(desired_replicas);
        let over_provision_count = ready.len() as i64 - desired;
        let budget = disruption_budget(ready.len(), desired_replicas, max_unavailable);

        debug!(
            desired_replicas,
            max_unavailable,
            disruption_budget = budget,
            ready = ready.len(),
            failed = failed.len(),
            deleting = deleting.len(),
            delete_annotated = delete_annotated.len(),
            without_latest_model = without_latest_model.len(),
            "Selecting machines to delete"
        );

        if !failed.is_empty() || !deleting.is_empty() {
            debug!(
                failed = ?provider_ids(&failed),
                deleting = ?provider_ids(&deleting),
                "Removing failed or deleting machines"
            );
            failed.extend(deleting);
            return Ok(failed);
        }

        if !delete_annotated.is_empty() {
            debug!(
                delete_annotated = ?provider_ids(&delete_annotated),
                "Removing machines annotated for deletion"
            );
            return Ok(delete_annotated);
        }

        if over_provision_count < 0 {
            debug!(
                ready = ready.len(),
                desired_replicas, "Not enough ready machines, nothing to delete"
            );
            return Ok(Vec::new());
        }

        if over_provision_count > 0 {
            let limit = over_provision_count as usize;
            let mut seen = HashSet::new();
            let to_delete: Vec<Machine> = without_latest_model
                .into_iter()
                .chain(ready)
                .filter(|m| seen.insert(m.provider_id.clone()))
                .take(limit)
                .collect();

            debug!(
                over_provision_count,
                to_delete = ?provider_ids(&to_delete),
                "Over-provisioned, removing machines"
            );
            return Ok(to_delete);
        }

        if without_latest_model.is_empty() {
            debug!("All machines run the latest model and the pool is not over-provisioned");
            return Ok(Vec::new());
        }

        if budget <= 0 {
            debug!(
                disruption_budget = budget,
                "Disruption budget exhausted, nothing to delete"
            );
            return Ok(Vec::new());
        }

        let to_delete: Vec<Machine> = ready
            .into_iter()
            .filter(|m| !m.status.latest_model_applied)
            .take(budget as usize)
            .collect();

        debug!(
            disruption_budget = budget,
            to_delete = ?provider_ids(&to_delete),
            "Removing old-model machines within disruption budget"
        );
        Ok(to_delete)
    }
}

impl DeleteSelector for RollingUpdateStrategy {
    fn select_machines_to_delete(
        &self,
        desired_replicas: u32,
        machines: &MachinesByProviderId,
    ) -> Result<Vec<Machine>, StrategyError> {
        self.select_machines_to_delete_with_rng(desired_replicas, machines, &mut rand::rng())
    }
}

impl Surger for RollingUpdateStrategy {
    /// Unset surge allows one extra machine. Percentages round up.
    fn surge(&self, desired_replicas: u32) -> Result<i64, StrategyError> {
        match &self.spec.max_surge {
            Some(value) => value
                .scaled_value(desired_replicas, true)
                .map_err(StrategyError::MaxSurge),
            None => Ok(i64::from(DEFAULT_MAX_SURGE)),
        }
    }
}

/// Ready machines that may be voluntarily removed this pass.
///
/// When `max_unavailable` exceeds the desired count the whole desired count
/// may go. Otherwise excess ready machines plus the unavailability allowance.
/// The result may be negative.
pub fn disruption_budget(ready: usize, desired_replicas: u32, max_unavailable: i64) -> i64 {
    let desired = i64::from(desired_replicas);
    if max_unavailable > desired {
        return desired;
    }
    ready as i64 - desired + max_unavailable
}

fn provider_ids(machines: &[Machine]) -> Vec<&str> {
    machines.iter().map(|m| m.provider_id.as_str()).collect()
}
