// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon.

use scanq_store::RetentionPolicy;
use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Resolve the data root: SCANQ_DATA_DIR > XDG_STATE_HOME/scanq >
/// ~/.local/state/scanq
pub fn data_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("SCANQ_DATA_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("scanq"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoDataDir)?;
    Ok(PathBuf::from(home).join(".local/state/scanq"))
}

/// Shared key/value service endpoint.
pub fn redis_url() -> String {
    std::env::var("SCANQ_REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/0".to_string())
}

/// Scanner registry file (SCANQ_SCANNERS_FILE, default `<data>/scanners.yaml`).
pub fn scanners_file(data_dir: &std::path::Path) -> PathBuf {
    std::env::var("SCANQ_SCANNERS_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| data_dir.join("scanners.yaml"))
}

/// Listener socket (SCANQ_SOCKET, default `<data>/scanqd.sock`).
pub fn socket_path(data_dir: &std::path::Path) -> PathBuf {
    std::env::var("SCANQ_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|_| data_dir.join("scanqd.sock"))
}

/// Pools this daemon's worker dequeues from. Empty means all.
pub fn worker_pools() -> Vec<String> {
    std::env::var("SCANQ_WORKER_POOLS")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_u64(var: &str) -> Option<u64> {
    std::env::var(var).ok().and_then(|s| s.parse().ok())
}

/// Global concurrent-scan bound (default 4).
pub fn max_concurrent_scans() -> usize {
    parse_u64("SCANQ_MAX_CONCURRENT_SCANS").unwrap_or(4) as usize
}

/// Per-task deadline (SCANQ_TASK_DEADLINE_HOURS, default 24h).
pub fn task_deadline() -> Duration {
    Duration::from_secs(parse_u64("SCANQ_TASK_DEADLINE_HOURS").unwrap_or(24) * 3600)
}

/// Remote status poll interval (SCANQ_POLL_INTERVAL_SECS, default 30s).
pub fn poll_interval() -> Duration {
    Duration::from_secs(parse_u64("SCANQ_POLL_INTERVAL_SECS").unwrap_or(30))
}

/// Terminal-task retention windows (SCANQ_COMPLETED_RETENTION_DAYS,
/// SCANQ_FAILED_RETENTION_DAYS).
pub fn retention() -> RetentionPolicy {
    let defaults = RetentionPolicy::default();
    RetentionPolicy {
        completed: parse_u64("SCANQ_COMPLETED_RETENTION_DAYS")
            .map(|d| chrono::Duration::days(d as i64))
            .unwrap_or(defaults.completed),
        failed: parse_u64("SCANQ_FAILED_RETENTION_DAYS")
            .map(|d| chrono::Duration::days(d as i64))
            .unwrap_or(defaults.failed),
    }
}

/// Log directory; stderr-only logging when unset.
pub fn log_dir() -> Option<PathBuf> {
    std::env::var("SCANQ_LOG_DIR").ok().map(PathBuf::from)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
