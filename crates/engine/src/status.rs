// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status and listing projections over stored task records.
//!
//! Views are explicit field sets: credential material never reaches a
//! client even while a QUEUED record still carries it.

use crate::error::EngineError;
use chrono::{DateTime, Utc};
use scanq_core::time_fmt::{format_elapsed, rfc3339_micros};
use scanq_core::{
    AuthenticationStatus, ResultsSummary, ScanType, TaskId, TaskRecord, TaskStatus,
};
use scanq_store::{TaskFilter, TaskStore};
use serde::{Deserialize, Serialize};

/// Static guidance returned when a scan failed on credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Troubleshooting {
    pub next_steps: Vec<String>,
}

fn credential_next_steps() -> Vec<String> {
    [
        "Verify the SSH username and password against the target",
        "Confirm the escalation method and escalation secret are correct",
        "Check that the account is not locked out on the target",
        "Resubmit the scan once credentials are fixed",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Full task projection for `get_scan_status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusView {
    pub task_id: TaskId,
    pub trace_id: scanq_core::TraceId,
    pub scan_type: ScanType,
    pub status: TaskStatus,
    pub scanner_pool: String,
    pub scanner_instance: String,
    pub name: String,
    pub targets: Vec<String>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    /// Wall-clock runtime so far (or total, once terminal).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_scan_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication_status: Option<AuthenticationStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results_summary: Option<ResultsSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub troubleshooting: Option<Troubleshooting>,
}

/// Whether a failed record's root cause is target credentials.
fn failed_on_credentials(record: &TaskRecord) -> bool {
    record.status == TaskStatus::Failed
        && matches!(
            record.authentication_status,
            Some(AuthenticationStatus::Failed) | Some(AuthenticationStatus::Partial)
        )
}

/// Build the status view for one record.
pub fn task_status_view(record: &TaskRecord, now: DateTime<Utc>) -> TaskStatusView {
    let elapsed = record.started_at.map(|started| {
        let end = record.completed_at.unwrap_or(now);
        format_elapsed((end - started).num_seconds().max(0) as u64)
    });
    let troubleshooting = failed_on_credentials(record).then(|| Troubleshooting {
        next_steps: credential_next_steps(),
    });
    TaskStatusView {
        task_id: record.task_id.clone(),
        trace_id: record.trace_id.clone(),
        scan_type: record.scan_type,
        status: record.status,
        scanner_pool: record.scanner_pool.clone(),
        scanner_instance: record.scanner_instance_id.clone(),
        name: record.payload.name.clone(),
        targets: record.payload.target_list(),
        created_at: rfc3339_micros(record.created_at),
        started_at: record.started_at.map(rfc3339_micros),
        completed_at: record.completed_at.map(rfc3339_micros),
        elapsed,
        remote_scan_id: record.remote_scan_id.clone(),
        authentication_status: record.authentication_status,
        validation_warnings: record.validation_warnings.clone(),
        results_summary: record.results_summary.clone(),
        error_message: record.error_message.clone(),
        troubleshooting,
    }
}

/// Load a task and project its status.
pub fn get_scan_status(
    store: &TaskStore,
    task_id: &TaskId,
    now: DateTime<Utc>,
) -> Result<TaskStatusView, EngineError> {
    let record = store.get(task_id)?;
    Ok(task_status_view(&record, now))
}

/// One row in a task listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub scan_type: ScanType,
    pub scanner_pool: String,
    pub name: String,
    pub targets: Vec<String>,
    pub created_at: String,
}

/// Listing filter, as received from the client.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub status: Option<String>,
    pub scanner_pool: Option<String>,
    pub target_filter: Option<String>,
    pub limit: Option<usize>,
}

fn parse_status(raw: &str) -> Result<TaskStatus, EngineError> {
    match raw.to_ascii_lowercase().as_str() {
        "queued" => Ok(TaskStatus::Queued),
        "running" => Ok(TaskStatus::Running),
        "completed" => Ok(TaskStatus::Completed),
        "failed" => Ok(TaskStatus::Failed),
        "timeout" => Ok(TaskStatus::Timeout),
        other => Err(EngineError::Validation(format!(
            "unknown status filter: {other}"
        ))),
    }
}

/// List tasks, newest first.
pub fn list_tasks(store: &TaskStore, query: &ListQuery) -> Result<Vec<TaskSummary>, EngineError> {
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let filter = TaskFilter {
        status,
        pool: query.scanner_pool.clone(),
        target: query.target_filter.clone(),
        limit: query.limit,
    };
    let records = store.list(&filter)?;
    Ok(records
        .iter()
        .map(|record| TaskSummary {
            task_id: record.task_id.clone(),
            status: record.status,
            scan_type: record.scan_type,
            scanner_pool: record.scanner_pool.clone(),
            name: record.payload.name.clone(),
            targets: record.payload.target_list(),
            created_at: rfc3339_micros(record.created_at),
        })
        .collect())
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
