//! Machine records as seen by the pool reconciler.
//!
//! A [`Machine`] is the orchestrator's view of one provider-backed instance.
//! Its status fields are synced out-of-band from the provider; the selection
//! policy only reads them.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Annotation that marks a machine for deletion by a user or autoscaler.
pub const DELETE_MACHINE_ANNOTATION: &str = "cluster.x-k8s.io/delete-machine";

/// Provisioning state reported by the provider for a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProvisioningState {
    Accepted,
    Creating,
    Updating,
    Succeeded,
    Failed,
    Canceled,
    Deleting,
    Deleted,
}

impl ProvisioningState {
    /// Returns true if the provider will not move out of this state on its own.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Accepted => "Accepted",
            Self::Creating => "Creating",
            Self::Updating => "Updating",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Canceled => "Canceled",
            Self::Deleting => "Deleting",
            Self::Deleted => "Deleted",
        };
        f.write_str(s)
    }
}

/// Observed status of a machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineStatus {
    /// Provider provisioning state; `None` until first synced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<ProvisioningState>,

    /// The node backing this machine is ready.
    #[serde(default)]
    pub ready: bool,

    /// The machine runs the pool's current model.
    #[serde(default)]
    pub latest_model_applied: bool,
}

/// A provider-backed compute instance in a machine pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    /// Unique provider ID.
    pub provider_id: String,

    pub creation_timestamp: DateTime<Utc>,

    /// Set once the orchestrator has requested deletion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    /// Annotations on the owning orchestrator machine.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub owner_annotations: BTreeMap<String, String>,

    #[serde(default)]
    pub status: MachineStatus,
}

impl Machine {
    /// Create a machine with empty status.
    pub fn new(provider_id: impl Into<String>, creation_timestamp: DateTime<Utc>) -> Self {
        Self {
            provider_id: provider_id.into(),
            creation_timestamp,
            deletion_timestamp: None,
            annotations: BTreeMap::new(),
            owner_annotations: BTreeMap::new(),
            status: MachineStatus::default(),
        }
    }

    pub fn provisioning_state(&self) -> Option<ProvisioningState> {
        self.status.provisioning_state
    }

    /// Returns true if the provider reports the given state.
    pub fn is_in_state(&self, state: ProvisioningState) -> bool {
        self.status.provisioning_state == Some(state)
    }

    /// Returns true if the orchestrator has already requested deletion.
    pub fn is_marked_for_deletion(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    /// Returns true if the machine carries the delete annotation.
    pub fn has_delete_annotation(&self) -> bool {
        self.annotations.contains_key(DELETE_MACHINE_ANNOTATION)
    }

    /// Copy the delete annotation from the owning machine if this machine
    /// does not carry one yet.
    ///
    /// Returns true if the annotation was copied.
    pub fn inherit_owner_delete_annotation(&mut self) -> bool {
        if self.has_delete_annotation() {
            return false;
        }
        let Some(value) = self.owner_annotations.get(DELETE_MACHINE_ANNOTATION) else {
            return false;
        };

        self.annotations
            .insert(DELETE_MACHINE_ANNOTATION.to_string(), value.clone());
        true
    }

    // Builder helpers, mostly for snapshots and tests.

    pub fn with_state(mut self, state: ProvisioningState) -> Self {
        self.status.provisioning_state = Some(state);
        self
    }

    pub fn with_ready(mut self, ready: bool) -> Self {
        self.status.ready = ready;
        self
    }

    pub fn with_latest_model(mut self, latest_model_applied: bool) -> Self {
        self.status.latest_model_applied = latest_model_applied;
        self
    }

    pub fn with_deletion_timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.deletion_timestamp = Some(at);
        self
    }

    pub fn with_delete_annotation(mut self) -> Self {
        self.annotations
            .insert(DELETE_MACHINE_ANNOTATION.to_string(), "true".to_string());
        self
    }

    pub fn with_owner_delete_annotation(mut self) -> Self {
        self.owner_annotations
            .insert(DELETE_MACHINE_ANNOTATION.to_string(), "true".to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(ProvisioningState::Succeeded.is_terminal());
        assert!(ProvisioningState::Failed.is_terminal());
        assert!(ProvisioningState::Canceled.is_terminal());
        assert!(!ProvisioningState::Deleting.is_terminal());
        assert!(!ProvisioningState::Updating.is_terminal());
    }

    #[test]
    fn test_machine_deserializes_from_camel_case() {
        let json = serde_json::json!({
            "providerId": "azure:///vm/0",
            "creationTimestamp": "2024-01-01T00:00:00Z",
            "annotations": { "cluster.x-k8s.io/delete-machine": "" },
            "status": {
                "provisioningState": "Succeeded",
                "ready": true,
                "latestModelApplied": false
            }
        });

        let machine: Machine = serde_json::from_value(json).unwrap();
        assert_eq!(machine.provider_id, "azure:///vm/0");
        assert_eq!(
            machine.creation_timestamp,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert!(machine.has_delete_annotation());
        assert!(!machine.is_marked_for_deletion());
        assert!(machine.is_in_state(ProvisioningState::Succeeded));
        assert!(machine.status.ready);
        assert!(!machine.status.latest_model_applied);
    }

    #[test]
    fn test_inherit_owner_delete_annotation() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let mut machine = Machine::new("vm-0", created).with_owner_delete_annotation();
        assert!(!machine.has_delete_annotation());
        assert!(machine.inherit_owner_delete_annotation());
        assert!(machine.has_delete_annotation());
        assert!(!machine.inherit_owner_delete_annotation());

        let mut plain = Machine::new("vm-1", created);
        assert!(!plain.inherit_owner_delete_annotation());
        assert!(!plain.has_delete_annotation());
    }

    #[test]
    fn test_own_delete_annotation_is_kept() {
        let mut machine = Machine::new("vm-0", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        machine
            .annotations
            .insert(DELETE_MACHINE_ANNOTATION.to_string(), "mine".to_string());
        machine
            .owner_annotations
            .insert(DELETE_MACHINE_ANNOTATION.to_string(), "owner".to_string());

        assert!(!machine.inherit_owner_delete_annotation());
        assert_eq!(machine.annotations[DELETE_MACHINE_ANNOTATION], "mine");
    }
}
