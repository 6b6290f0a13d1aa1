// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task record and status state machine.

use crate::id::{TaskId, TraceId};
use crate::payload::ScanPayload;
use crate::time_fmt::{serde_rfc3339_micros, serde_rfc3339_micros_opt};
use crate::validation::{AuthenticationStatus, ResultsSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of scan requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    Untrusted,
    Authenticated,
    AuthenticatedPrivileged,
}

impl ScanType {
    /// Credentialed scans carry SSH material in the payload.
    pub fn requires_credentials(&self) -> bool {
        !matches!(self, ScanType::Untrusted)
    }

    /// Privileged scans additionally require a privilege-escalation method.
    pub fn is_privileged(&self) -> bool {
        matches!(self, ScanType::AuthenticatedPrivileged)
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanType::Untrusted => write!(f, "untrusted"),
            ScanType::Authenticated => write!(f, "authenticated"),
            ScanType::AuthenticatedPrivileged => write!(f, "authenticated_privileged"),
        }
    }
}

/// Lifecycle status of a task. Transitions are monotonic per
/// [`can_transition`]; the three terminal states are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Timeout,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Timeout
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Queued => write!(f, "queued"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Timeout => write!(f, "timeout"),
        }
    }
}

/// Allowed status transitions.
///
/// ```text
/// QUEUED  -> RUNNING | FAILED
/// RUNNING -> COMPLETED | FAILED | TIMEOUT
/// ```
pub fn can_transition(from: TaskStatus, to: TaskStatus) -> bool {
    use TaskStatus::*;
    matches!(
        (from, to),
        (Queued, Running)
            | (Queued, Failed)
            | (Running, Completed)
            | (Running, Failed)
            | (Running, Timeout)
    )
}

/// Persistent record of a single scan request.
///
/// Created in QUEUED by the submission frontend; thereafter mutated only by
/// the worker (and the housekeeper's recovery rule) through the task store's
/// serialized transition operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: TaskId,
    pub trace_id: TraceId,
    pub scan_type: ScanType,
    pub scanner_pool: String,
    /// Instance chosen as the submission-time candidate; the worker records
    /// the instance it actually acquired here on entry to RUNNING.
    pub scanner_instance_id: String,
    /// True when the client named the instance explicitly; the worker then
    /// acquires that instance only.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub scanner_instance_pinned: bool,
    pub status: TaskStatus,
    pub payload: ScanPayload,
    /// Remote handle from the driver's create_scan. Set once, never mutated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_scan_id: Option<String>,
    #[serde(with = "serde_rfc3339_micros")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        with = "serde_rfc3339_micros_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "serde_rfc3339_micros_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<DateTime<Utc>>,
    /// Refreshed by the worker on each poll iteration while RUNNING.
    #[serde(
        default,
        with = "serde_rfc3339_micros_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub heartbeat_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication_status: Option<AuthenticationStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results_summary: Option<ResultsSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl TaskRecord {
    /// Create a fresh QUEUED record.
    pub fn new(
        task_id: TaskId,
        trace_id: TraceId,
        scan_type: ScanType,
        scanner_pool: impl Into<String>,
        scanner_instance_id: impl Into<String>,
        payload: ScanPayload,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id,
            trace_id,
            scan_type,
            scanner_pool: scanner_pool.into(),
            scanner_instance_id: scanner_instance_id.into(),
            scanner_instance_pinned: false,
            status: TaskStatus::Queued,
            payload,
            remote_scan_id: None,
            created_at,
            started_at: None,
            completed_at: None,
            heartbeat_at: None,
            authentication_status: None,
            validation_warnings: Vec::new(),
            results_summary: None,
            error_message: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Seconds since the task reached a terminal state, if it has.
    pub fn terminal_age_secs(&self, now: DateTime<Utc>) -> Option<u64> {
        if !self.is_terminal() {
            return None;
        }
        let completed = self.completed_at?;
        Some((now - completed).num_seconds().max(0) as u64)
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
