// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::Harness;
use scanq_core::test_support::{queued_record, untrusted_payload};
use scanq_core::{ScanType, TaskStatus};
use std::time::Duration;

#[test]
fn sweep_deletes_expired_and_recovers_abandoned() {
    let harness = Harness::new();
    let now = harness.clock.now_utc();

    // COMPLETED eight days ago: past retention.
    let old = queued_record("t-old", ScanType::Untrusted, untrusted_payload());
    harness.store.create(&old).unwrap();
    let eight_days_ago = now - chrono::Duration::days(8);
    harness
        .store
        .transition(&old.task_id, TaskStatus::Queued, TaskStatus::Running, eight_days_ago, |_| {})
        .unwrap();
    harness
        .store
        .transition(
            &old.task_id,
            TaskStatus::Running,
            TaskStatus::Completed,
            eight_days_ago,
            |_| {},
        )
        .unwrap();

    // RUNNING for three days with no heartbeat: abandoned.
    let stuck = queued_record("t-stuck", ScanType::Untrusted, untrusted_payload());
    harness.store.create(&stuck).unwrap();
    harness
        .store
        .transition(
            &stuck.task_id,
            TaskStatus::Queued,
            TaskStatus::Running,
            now - chrono::Duration::days(3),
            |_| {},
        )
        .unwrap();

    // Fresh QUEUED task: untouched.
    let fresh = queued_record("t-fresh", ScanType::Untrusted, untrusted_payload());
    harness.store.create(&fresh).unwrap();

    let config = HousekeeperConfig::default();
    let (deleted, recovered) = sweep_once(&harness.store, &harness.clock, &config);

    assert_eq!(deleted, vec![old.task_id.clone()]);
    assert_eq!(recovered, vec![stuck.task_id.clone()]);
    assert!(harness.store.get(&old.task_id).is_err());

    let stuck_record = harness.store.get(&stuck.task_id).unwrap();
    assert_eq!(stuck_record.status, TaskStatus::Failed);
    assert_eq!(stuck_record.error_message.as_deref(), Some("recovery"));

    assert_eq!(
        harness.store.get(&fresh.task_id).unwrap().status,
        TaskStatus::Queued
    );
}

#[test]
fn sweep_is_idempotent() {
    let harness = Harness::new();
    let config = HousekeeperConfig::default();
    let (deleted, recovered) = sweep_once(&harness.store, &harness.clock, &config);
    assert!(deleted.is_empty());
    assert!(recovered.is_empty());
    let (deleted, recovered) = sweep_once(&harness.store, &harness.clock, &config);
    assert!(deleted.is_empty());
    assert!(recovered.is_empty());
}

#[tokio::test]
async fn run_exits_on_shutdown() {
    let harness = Harness::new();
    let config = HousekeeperConfig {
        interval: Duration::from_millis(5),
        ..HousekeeperConfig::default()
    };
    let handle = tokio::spawn(run(
        harness.store.clone(),
        harness.clock.clone(),
        config,
        harness.shutdown_rx.clone(),
    ));
    tokio::time::sleep(Duration::from_millis(20)).await;
    harness.shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
}
