//! Machine pool rolling-update primitives.
//!
//! This library decides which machines in a pool to delete on each
//! reconciliation pass, converging the pool to its desired replica count and
//! current model. Key concepts:
//!
//! - **Desired state**: the pool's replica count and deployment strategy.
//! - **Observed state**: each machine's provisioning state, readiness and
//!   model, synced from the provider.
//! - **Disruption budget**: how many ready machines may be taken away now.
//!
//! # Invariants
//!
//! - Selection is a pure function of its inputs (plus the random source for
//!   random ordering)
//! - The selected machines are a subset of the pool with no duplicates
//! - Broken machines are always removed before healthy ones

mod classify;
mod error;
mod intstr;
mod machine;
mod order;
mod pool;
mod strategy;

pub use classify::{
    delete_annotated_machines, deleting_machines, failed_machines, machines_without_latest_model,
    ready_machines, Classification, MachinesByProviderId,
};
pub use error::{IntOrStringError, StrategyError};
pub use intstr::IntOrString;
pub use machine::{Machine, MachineStatus, ProvisioningState, DELETE_MACHINE_ANNOTATION};
pub use order::{
    order_by_delete_annotation, order_by_newest, order_by_oldest, order_machines, order_random,
    DeletePolicy,
};
pub use pool::{MachinePool, PoolSnapshot, SnapshotError, SnapshotFormat};
pub use strategy::{
    disruption_budget, DeleteSelector, DeploymentStrategy, RollingUpdate, RollingUpdateStrategy,
    StrategyType, Surger, DEFAULT_DELETE_POLICY, DEFAULT_MAX_SURGE, DEFAULT_MAX_UNAVAILABLE,
};
