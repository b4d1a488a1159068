//! mpool Pool Controller Library
//!
//! The pool controller removes machines from machine pools. Each pass it
//! reads every pool, asks the pool's deployment strategy which machines to
//! delete, and requests their deletion through the pool client.
//!
//! ## Modules
//!
//! - `client`: Pool access trait and the in-memory implementation
//! - `reconciler`: Single-pass pool reconciliation
//! - `worker`: Interval loop driving the reconciler

pub mod client;
pub mod config;
pub mod error;
pub mod reconciler;
pub mod worker;

pub use client::{InMemoryPoolClient, MachinePoolClient};
pub use error::{ControllerError, ControllerResult};
pub use reconciler::{PoolOutcome, PoolReconciler, ReconcileStats, SkipReason};
pub use worker::PoolWorker;
