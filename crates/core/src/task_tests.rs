// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::id::{TaskId, TraceId};
use crate::payload::ScanPayload;
use chrono::{TimeZone, Utc};

fn payload() -> ScanPayload {
    ScanPayload {
        targets: "10.0.0.0/24".to_string(),
        name: "nightly".to_string(),
        description: None,
        schema_profile: None,
        credentials: None,
    }
}

fn record() -> TaskRecord {
    TaskRecord::new(
        TaskId::new("nessus_s1_20260301_000000_abc123"),
        TraceId::new("trace-1"),
        ScanType::Untrusted,
        "nessus",
        "s1",
        payload(),
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
    )
}

#[yare::parameterized(
    queued_running     = { TaskStatus::Queued, TaskStatus::Running, true },
    queued_failed      = { TaskStatus::Queued, TaskStatus::Failed, true },
    running_completed  = { TaskStatus::Running, TaskStatus::Completed, true },
    running_failed     = { TaskStatus::Running, TaskStatus::Failed, true },
    running_timeout    = { TaskStatus::Running, TaskStatus::Timeout, true },
    queued_completed   = { TaskStatus::Queued, TaskStatus::Completed, false },
    queued_timeout     = { TaskStatus::Queued, TaskStatus::Timeout, false },
    running_queued     = { TaskStatus::Running, TaskStatus::Queued, false },
    completed_running  = { TaskStatus::Completed, TaskStatus::Running, false },
    completed_failed   = { TaskStatus::Completed, TaskStatus::Failed, false },
    failed_queued      = { TaskStatus::Failed, TaskStatus::Queued, false },
    timeout_running    = { TaskStatus::Timeout, TaskStatus::Running, false },
    self_loop          = { TaskStatus::Running, TaskStatus::Running, false },
)]
fn transition_table(from: TaskStatus, to: TaskStatus, allowed: bool) {
    assert_eq!(can_transition(from, to), allowed);
}

#[yare::parameterized(
    queued    = { TaskStatus::Queued, false },
    running   = { TaskStatus::Running, false },
    completed = { TaskStatus::Completed, true },
    failed    = { TaskStatus::Failed, true },
    timeout   = { TaskStatus::Timeout, true },
)]
fn terminal_statuses(status: TaskStatus, terminal: bool) {
    assert_eq!(status.is_terminal(), terminal);
}

#[test]
fn new_record_is_queued_with_no_timestamps() {
    let record = record();
    assert_eq!(record.status, TaskStatus::Queued);
    assert!(record.started_at.is_none());
    assert!(record.completed_at.is_none());
    assert!(record.error_message.is_none());
}

#[test]
fn record_round_trips_through_json() {
    let record = record();
    let json = serde_json::to_string(&record).unwrap();
    let back: TaskRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back.task_id, record.task_id);
    assert_eq!(back.status, TaskStatus::Queued);
    assert_eq!(back.created_at, record.created_at);
}

#[test]
fn timestamps_serialize_with_microseconds() {
    let record = record();
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["created_at"], "2026-03-01T00:00:00.000000Z");
    assert_eq!(json["status"], "queued");
    assert_eq!(json["scan_type"], "untrusted");
}

#[test]
fn terminal_age_requires_terminal_state() {
    let mut record = record();
    let now = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
    assert_eq!(record.terminal_age_secs(now), None);

    record.status = TaskStatus::Completed;
    record.completed_at = Some(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
    assert_eq!(record.terminal_age_secs(now), Some(86_400));
}

#[test]
fn scan_type_credential_requirements() {
    assert!(!ScanType::Untrusted.requires_credentials());
    assert!(ScanType::Authenticated.requires_credentials());
    assert!(ScanType::AuthenticatedPrivileged.requires_credentials());
    assert!(ScanType::AuthenticatedPrivileged.is_privileged());
    assert!(!ScanType::Authenticated.is_privileged());
}
