//! Machine classification by observed status.
//!
//! Every subset is extracted in provider-ID order so that later ordering
//! stages never depend on hash map iteration order.

use std::collections::HashMap;

use crate::machine::{Machine, ProvisioningState};

/// Machines in a pool keyed by provider ID.
pub type MachinesByProviderId = HashMap<String, Machine>;

/// Machines that carry the delete annotation.
pub fn delete_annotated_machines(machines: &MachinesByProviderId) -> Vec<Machine> {
    collect_sorted(machines, Machine::has_delete_annotation)
}

/// Machines whose provider reports a failed provisioning.
pub fn failed_machines(machines: &MachinesByProviderId) -> Vec<Machine> {
    collect_sorted(machines, |m| m.is_in_state(ProvisioningState::Failed))
}

/// Machines being torn down by the provider that the orchestrator has not yet
/// marked for deletion.
pub fn deleting_machines(machines: &MachinesByProviderId) -> Vec<Machine> {
    collect_sorted(machines, |m| {
        m.is_in_state(ProvisioningState::Deleting) && !m.is_marked_for_deletion()
    })
}

/// Machines that count as available capacity.
pub fn ready_machines(machines: &MachinesByProviderId) -> Vec<Machine> {
    collect_sorted(machines, |m| {
        m.status.ready
            && m.is_in_state(ProvisioningState::Succeeded)
            && !m.is_marked_for_deletion()
            && !m.is_in_state(ProvisioningState::Deleting)
    })
}

/// Machines not running the pool's current model.
pub fn machines_without_latest_model(machines: &MachinesByProviderId) -> Vec<Machine> {
    collect_sorted(machines, |m| !m.status.latest_model_applied)
}

fn collect_sorted<F>(machines: &MachinesByProviderId, predicate: F) -> Vec<Machine>
where
    F: Fn(&Machine) -> bool,
{
    let mut keys: Vec<&String> = machines
        .iter()
        .filter(|(_, m)| predicate(m))
        .map(|(k, _)| k)
        .collect();
    keys.sort();
    keys.into_iter().map(|k| machines[k].clone()).collect()
}

/// All subsets of a pool snapshot.
///
/// The subsets may overlap; for a consistent snapshot failed, deleting and
/// ready are disjoint.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub delete_annotated: Vec<Machine>,
    pub failed: Vec<Machine>,
    pub deleting: Vec<Machine>,
    pub ready: Vec<Machine>,
    pub without_latest_model: Vec<Machine>,
}

impl Classification {
    pub fn from_machines(machines: &MachinesByProviderId) -> Self {
        Self {
            delete_annotated: delete_annotated_machines(machines),
            failed: failed_machines(machines),
            deleting: deleting_machines(machines),
            ready: ready_machines(machines),
            without_latest_model: machines_without_latest_model(machines),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn machine(id: &str) -> Machine {
        Machine::new(id, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    fn pool(machines: Vec<Machine>) -> MachinesByProviderId {
        machines
            .into_iter()
            .map(|m| (m.provider_id.clone(), m))
            .collect()
    }

    fn ids(machines: &[Machine]) -> Vec<&str> {
        machines.iter().map(|m| m.provider_id.as_str()).collect()
    }

    #[test]
    fn test_classification_subsets() {
        let now = Utc::now();
        let machines = pool(vec![
            machine("ready")
                .with_state(ProvisioningState::Succeeded)
                .with_ready(true)
                .with_latest_model(true),
            machine("failed").with_state(ProvisioningState::Failed),
            machine("deleting").with_state(ProvisioningState::Deleting),
            machine("deleting-marked")
                .with_state(ProvisioningState::Deleting)
                .with_deletion_timestamp(now),
            machine("ready-marked")
                .with_state(ProvisioningState::Succeeded)
                .with_ready(true)
                .with_deletion_timestamp(now),
            machine("not-ready").with_state(ProvisioningState::Succeeded),
            machine("annotated")
                .with_state(ProvisioningState::Creating)
                .with_latest_model(true)
                .with_delete_annotation(),
        ]);

        let c = Classification::from_machines(&machines);
        assert_eq!(ids(&c.failed), vec!["failed"]);
        assert_eq!(ids(&c.deleting), vec!["deleting"]);
        assert_eq!(ids(&c.ready), vec!["ready"]);
        assert_eq!(ids(&c.delete_annotated), vec!["annotated"]);
        assert_eq!(
            ids(&c.without_latest_model),
            vec!["deleting", "deleting-marked", "failed", "not-ready", "ready-marked"]
        );
    }

    #[test]
    fn test_subsets_are_sorted_by_provider_id() {
        let machines = pool(
            ["c", "a", "d", "b"]
                .into_iter()
                .map(|id| machine(id).with_state(ProvisioningState::Failed))
                .collect(),
        );

        assert_eq!(ids(&failed_machines(&machines)), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_machine_without_state_is_in_no_state_subset() {
        let machines = pool(vec![machine("new").with_ready(true)]);
        let c = Classification::from_machines(&machines);
        assert!(c.failed.is_empty());
        assert!(c.deleting.is_empty());
        assert!(c.ready.is_empty());
        assert_eq!(c.without_latest_model.len(), 1);
    }
}
