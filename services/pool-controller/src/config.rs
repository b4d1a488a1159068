//! Configuration for the pool controller.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Pool controller configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Snapshot file the in-memory pool client is seeded from.
    pub snapshot_path: PathBuf,

    /// Interval between reconciliation passes.
    pub reconcile_interval: Duration,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("pools.json"),
            reconcile_interval: Duration::from_secs(30),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let snapshot_path = std::env::var("MPOOL_SNAPSHOT_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.snapshot_path);

        let reconcile_interval = match std::env::var("MPOOL_RECONCILE_INTERVAL_SECS") {
            Ok(raw) => parse_interval(&raw)
                .with_context(|| format!("invalid MPOOL_RECONCILE_INTERVAL_SECS: {raw:?}"))?,
            Err(_) => defaults.reconcile_interval,
        };

        let log_level = std::env::var("MPOOL_LOG_LEVEL").unwrap_or(defaults.log_level);

        Ok(Self {
            snapshot_path,
            reconcile_interval,
            log_level,
        })
    }
}

/// Parse a reconcile interval in whole seconds; zero is rejected.
fn parse_interval(raw: &str) -> Result<Duration> {
    let secs: u64 = raw.trim().parse().context("not a number of seconds")?;
    if secs == 0 {
        bail!("reconcile interval must be at least one second");
    }
    Ok(Duration::from_secs(secs))
}
