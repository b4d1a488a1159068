//! Controller errors.

use mpool_reconcile::StrategyError;
use thiserror::Error;

/// Result type for controller operations.
pub type ControllerResult<T> = Result<T, ControllerError>;

/// Errors that can occur while reconciling a pool.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("failed selecting machines to delete in pool {pool}")]
    Selection {
        pool: String,
        #[source]
        source: StrategyError,
    },

    #[error("machine pool not found: {0}")]
    PoolNotFound(String),

    #[error("machine {provider_id} not found in pool {pool}")]
    MachineNotFound { pool: String, provider_id: String },

    #[error("failed deleting machine {provider_id} to reduce replica count: {message}")]
    Delete {
        provider_id: String,
        message: String,
    },
}
