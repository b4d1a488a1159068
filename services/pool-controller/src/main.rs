//! mpool Pool Controller
//!
//! Periodically reconciles machine pools: failed machines are removed, excess
//! capacity is trimmed, and old-model machines are rolled within the pool's
//! disruption budget.
//!
//! Pools are read from a snapshot file into the in-memory client (dev mode).

use std::sync::Arc;

use anyhow::{Context, Result};
use mpool_controller::config::Config;
use mpool_controller::{InMemoryPoolClient, PoolReconciler, PoolWorker};
use mpool_reconcile::{PoolSnapshot, SnapshotFormat};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!(
        snapshot_path = %config.snapshot_path.display(),
        reconcile_interval_secs = config.reconcile_interval.as_secs(),
        "Starting mpool pool controller"
    );

    let contents = tokio::fs::read_to_string(&config.snapshot_path)
        .await
        .with_context(|| format!("failed to read {}", config.snapshot_path.display()))?;
    let snapshot = PoolSnapshot::parse(&contents, SnapshotFormat::from_path(&config.snapshot_path))
        .with_context(|| format!("failed to parse {}", config.snapshot_path.display()))?;

    for pool in &snapshot.pools {
        if let Some(Err(e)) = pool.strategy.as_ref().map(|s| s.validate()) {
            warn!(
                pool = %pool.name,
                error = %e,
                "Pool strategy is invalid, pool will be skipped"
            );
        }
    }
    info!(pool_count = snapshot.pools.len(), "Snapshot loaded");

    let client = Arc::new(InMemoryPoolClient::new(snapshot.pools));
    let worker = PoolWorker::new(PoolReconciler::new(client), config.reconcile_interval);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = tokio::spawn(async move {
        worker.run(shutdown_rx).await;
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Received shutdown signal");

    let _ = shutdown_tx.send(true);
    if let Err(e) = worker_handle.await {
        error!(error = %e, "Pool worker panicked");
    }

    info!("Pool controller shutdown complete");
    Ok(())
}
