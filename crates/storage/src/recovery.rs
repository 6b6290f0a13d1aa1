// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash recovery and retention sweeps over the task store.

use crate::task_store::{StoreError, TaskFilter, TaskStore};
use chrono::{DateTime, Duration, Utc};
use scanq_core::{TaskId, TaskStatus};
use tracing::{info, warn};

/// How long terminal tasks are kept before deletion.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    pub completed: Duration,
    pub failed: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            completed: Duration::days(7),
            failed: Duration::days(30),
        }
    }
}

/// Startup recovery: RUNNING tasks older than the per-task deadline are
/// crash leftovers; force them to FAILED("recovery").
pub fn recover_stale_running(
    store: &TaskStore,
    now: DateTime<Utc>,
    deadline: Duration,
) -> Result<Vec<TaskId>, StoreError> {
    force_fail_running(store, now, deadline, false)
}

/// Housekeeper rule: RUNNING older than twice the per-task deadline with no
/// live worker heartbeat is abandoned; force it to FAILED("recovery").
pub fn sweep_abandoned_running(
    store: &TaskStore,
    now: DateTime<Utc>,
    deadline: Duration,
) -> Result<Vec<TaskId>, StoreError> {
    force_fail_running(store, now, deadline * 2, true)
}

fn force_fail_running(
    store: &TaskStore,
    now: DateTime<Utc>,
    age_limit: Duration,
    require_stale_heartbeat: bool,
) -> Result<Vec<TaskId>, StoreError> {
    let filter = TaskFilter {
        status: Some(TaskStatus::Running),
        ..TaskFilter::default()
    };
    let mut recovered = Vec::new();
    for record in store.list(&filter)? {
        let started = record.started_at.unwrap_or(record.created_at);
        if now - started <= age_limit {
            continue;
        }
        if require_stale_heartbeat {
            // A heartbeat within one age limit means a worker still owns it.
            if let Some(beat) = record.heartbeat_at {
                if now - beat <= age_limit {
                    continue;
                }
            }
        }
        match store.transition(
            &record.task_id,
            TaskStatus::Running,
            TaskStatus::Failed,
            now,
            |r| r.error_message = Some("recovery".to_string()),
        ) {
            Ok(_) => {
                info!(task_id = %record.task_id, "recovered stale RUNNING task");
                recovered.push(record.task_id);
            }
            Err(e) => warn!(task_id = %record.task_id, error = %e, "recovery transition failed"),
        }
    }
    Ok(recovered)
}

/// Delete terminal tasks whose age exceeds the status-dependent retention.
/// QUEUED and RUNNING tasks are never deleted here.
pub fn sweep_expired(
    store: &TaskStore,
    now: DateTime<Utc>,
    policy: RetentionPolicy,
) -> Result<Vec<TaskId>, StoreError> {
    let mut deleted = Vec::new();
    for record in store.list(&TaskFilter::default())? {
        let retention = match record.status {
            TaskStatus::Completed => policy.completed,
            TaskStatus::Failed | TaskStatus::Timeout => policy.failed,
            TaskStatus::Queued | TaskStatus::Running => continue,
        };
        let Some(age_secs) = record.terminal_age_secs(now) else {
            continue;
        };
        if age_secs as i64 > retention.num_seconds() {
            store.delete(&record.task_id)?;
            info!(
                task_id = %record.task_id,
                status = %record.status,
                "retention sweep deleted task"
            );
            deleted.push(record.task_id);
        }
    }
    Ok(deleted)
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
