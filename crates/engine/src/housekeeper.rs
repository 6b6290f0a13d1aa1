// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Housekeeper: periodic retention sweep and abandoned-task recovery.

use scanq_core::{Clock, TaskId};
use scanq_store::{sweep_abandoned_running, sweep_expired, RetentionPolicy, TaskStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct HousekeeperConfig {
    pub interval: Duration,
    pub retention: RetentionPolicy,
    /// Per-task deadline; RUNNING tasks older than twice this with a stale
    /// heartbeat are force-failed.
    pub task_deadline: Duration,
}

impl Default for HousekeeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            retention: RetentionPolicy::default(),
            task_deadline: Duration::from_secs(24 * 3600),
        }
    }
}

/// One idempotent sweep pass. Returns (deleted, recovered) task ids.
pub fn sweep_once<C: Clock>(
    store: &TaskStore,
    clock: &C,
    config: &HousekeeperConfig,
) -> (Vec<TaskId>, Vec<TaskId>) {
    let now = clock.now_utc();
    let deadline = chrono::Duration::from_std(config.task_deadline)
        .unwrap_or_else(|_| chrono::Duration::hours(24));

    let recovered = match sweep_abandoned_running(store, now, deadline) {
        Ok(recovered) => recovered,
        Err(e) => {
            warn!(error = %e, "abandoned-task sweep failed");
            Vec::new()
        }
    };
    let deleted = match sweep_expired(store, now, config.retention) {
        Ok(deleted) => deleted,
        Err(e) => {
            warn!(error = %e, "retention sweep failed");
            Vec::new()
        }
    };
    if !deleted.is_empty() || !recovered.is_empty() {
        info!(
            deleted = deleted.len(),
            recovered = recovered.len(),
            "housekeeping pass finished"
        );
    }
    (deleted, recovered)
}

/// Run sweeps on the configured interval until shutdown.
pub async fn run<C: Clock>(
    store: Arc<TaskStore>,
    clock: C,
    config: HousekeeperConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            _ = shutdown.wait_for(|stop| *stop) => return,
        }
        sweep_once(&store, &clock, &config);
    }
}

#[cfg(test)]
#[path = "housekeeper_tests.rs"]
mod tests;
