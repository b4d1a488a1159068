//! Pool controller background worker.
//!
//! Runs the pool reconciliation loop on a periodic interval.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, instrument};

use crate::client::MachinePoolClient;
use crate::error::ControllerResult;
use crate::reconciler::PoolReconciler;

/// Worker that runs the reconciliation loop.
pub struct PoolWorker<C> {
    reconciler: PoolReconciler<C>,
    interval: Duration,
}

impl<C: MachinePoolClient> PoolWorker<C> {
    pub fn new(reconciler: PoolReconciler<C>, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
        }
    }

    /// Run the worker until shutdown is signaled.
    ///
    /// The first pass runs immediately.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting pool worker"
        );

        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.run_reconciliation().await {
                        error!(error = %e, "Pool reconciliation failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Pool worker shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn run_reconciliation(&self) -> ControllerResult<()> {
        let stats = self.reconciler.reconcile_all().await?;

        if stats.machines_deleted > 0 || stats.pools_failed > 0 {
            info!(
                pools_processed = stats.pools_processed,
                pools_failed = stats.pools_failed,
                machines_deleted = stats.machines_deleted,
                "Pool reconciliation made changes"
            );
        }

        Ok(())
    }
}
