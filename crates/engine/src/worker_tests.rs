// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::submit::{submit, SubmitRequest};
use crate::test_helpers::{export, host, item, local_check_items, untrusted_export, Harness};
use scanq_core::test_support::{ssh_payload, untrusted_payload};
use scanq_core::{AuthenticationStatus, FakeClock, ScanType};
use scanq_queue::MemoryQueue;
use scanq_scanner::{FakeDriverFactory, RemoteScanState};

type TestWorker = Worker<MemoryQueue, FakeDriverFactory, FakeClock>;

fn fast_config() -> WorkerConfig {
    WorkerConfig {
        pools: Vec::new(),
        dequeue_timeout: Duration::from_millis(50),
        poll_interval: Duration::from_millis(1),
        task_deadline: Duration::from_secs(3600),
        max_concurrent_scans: 2,
        capacity_backoff: Duration::from_millis(1),
        shutdown_grace: Duration::from_secs(1),
        export_attempts: 2,
    }
}

fn worker(harness: &Harness, config: WorkerConfig) -> TestWorker {
    Worker::new(
        harness.store.clone(),
        harness.queue.clone(),
        harness.registry.clone(),
        harness.factory.clone(),
        harness.clock.clone(),
        config,
        harness.shutdown_rx.clone(),
    )
}

/// Pop one entry and run its full lifecycle inline.
async fn dispatch_one(worker: &TestWorker) -> bool {
    let pools = worker.dequeue_pools();
    match worker
        .queue
        .dequeue_any(&pools, Duration::from_millis(50))
        .await
        .unwrap()
    {
        Some(entry) => {
            let permit = worker.semaphore.clone().acquire_owned().await.unwrap();
            worker.run_scan(entry, permit).await;
            true
        }
        None => false,
    }
}

async fn submit_scan(harness: &Harness, request: SubmitRequest) -> scanq_core::TaskId {
    submit(
        &harness.store,
        harness.queue.as_ref(),
        harness.queue.as_ref(),
        &harness.registry,
        &harness.clock,
        request,
    )
    .await
    .unwrap()
    .task_id
}

async fn submit_untrusted(harness: &Harness) -> scanq_core::TaskId {
    submit_scan(
        harness,
        SubmitRequest {
            scan_type: ScanType::Untrusted,
            payload: untrusted_payload(),
            scanner_pool: None,
            scanner_instance: None,
            idempotency_key: None,
        },
    )
    .await
}

#[tokio::test]
async fn untrusted_happy_path_completes() {
    let harness = Harness::new();
    let task_id = submit_untrusted(&harness).await;

    let w = worker(&harness, fast_config());
    assert!(dispatch_one(&w).await);

    let record = harness.store.get(&task_id).unwrap();
    assert_eq!(record.status, TaskStatus::Completed);
    assert!(record.started_at.is_some());
    assert!(record.completed_at.is_some());
    assert!(record.heartbeat_at.is_some());
    assert_eq!(record.remote_scan_id.as_deref(), Some("fake-scan-1"));
    assert_eq!(
        record.authentication_status,
        Some(AuthenticationStatus::NotApplicable)
    );
    let summary = record.results_summary.unwrap();
    assert_eq!(summary.host_count, 2);
    assert_eq!(summary.total_findings, 5);

    // Artifact persisted byte-identical to the driver export.
    assert_eq!(
        harness.store.read_artifact(&task_id).unwrap(),
        untrusted_export()
    );

    // Lifecycle calls happened and the slot was released.
    assert_eq!(harness.driver.launched(), vec!["fake-scan-1"]);
    assert_eq!(harness.driver.deleted(), vec!["fake-scan-1"]);
    assert_eq!(
        harness.registry.pool_status("nessus").unwrap().in_flight_total,
        0
    );
}

#[tokio::test]
async fn credentials_reach_the_driver_then_vanish() {
    let harness = Harness::new();
    harness
        .driver
        .set_export_bytes(export(&host("10.20.0.5", None, &local_check_items(6))));
    let task_id = submit_scan(
        &harness,
        SubmitRequest {
            scan_type: ScanType::Authenticated,
            payload: ssh_payload(false),
            scanner_pool: None,
            scanner_instance: None,
            idempotency_key: None,
        },
    )
    .await;

    let w = worker(&harness, fast_config());
    dispatch_one(&w).await;

    let created = harness.driver.created_requests();
    assert_eq!(created.len(), 1);
    let sent = created[0].credentials.as_ref().unwrap();
    assert_eq!(sent.username, "svc-scan");
    assert_eq!(sent.secret, "pw");

    let record = harness.store.get(&task_id).unwrap();
    assert_eq!(record.status, TaskStatus::Completed);
    assert_eq!(
        record.authentication_status,
        Some(AuthenticationStatus::Success)
    );
    assert!(record.payload.credentials.is_none());
    let raw = std::fs::read_to_string(
        harness.store.root().join(task_id.as_str()).join("task.json"),
    )
    .unwrap();
    assert!(!raw.contains("\"pw\""));
}

#[tokio::test]
async fn authenticated_partial_completes_with_warning() {
    let harness = Harness::new();
    harness
        .driver
        .set_export_bytes(export(&host("10.20.0.5", None, &local_check_items(2))));
    let task_id = submit_scan(
        &harness,
        SubmitRequest {
            scan_type: ScanType::Authenticated,
            payload: ssh_payload(false),
            scanner_pool: None,
            scanner_instance: None,
            idempotency_key: None,
        },
    )
    .await;

    let w = worker(&harness, fast_config());
    dispatch_one(&w).await;

    let record = harness.store.get(&task_id).unwrap();
    assert_eq!(record.status, TaskStatus::Completed);
    assert_eq!(
        record.authentication_status,
        Some(AuthenticationStatus::Partial)
    );
    assert!(!record.validation_warnings.is_empty());
}

#[tokio::test]
async fn privileged_auth_failure_fails_the_task() {
    let harness = Harness::new();
    // Scan ran, but nothing authenticated-only showed up.
    harness
        .driver
        .set_export_bytes(export(&host("10.20.0.5", None, &item(19506, "Scan Info", "Settings", 0))));
    let task_id = submit_scan(
        &harness,
        SubmitRequest {
            scan_type: ScanType::AuthenticatedPrivileged,
            payload: ssh_payload(true),
            scanner_pool: None,
            scanner_instance: None,
            idempotency_key: None,
        },
    )
    .await;

    let w = worker(&harness, fast_config());
    dispatch_one(&w).await;

    let record = harness.store.get(&task_id).unwrap();
    assert_eq!(record.status, TaskStatus::Failed);
    assert_eq!(
        record.authentication_status,
        Some(AuthenticationStatus::Failed)
    );
    assert!(record
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("credentials"));

    let dead = harness.queue.peek_dlq("nessus", 10).await.unwrap();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].task_id, task_id);
}

#[tokio::test]
async fn remote_failure_state_fails_and_dead_letters() {
    let harness = Harness::new();
    harness.driver.push_status(RemoteScanState::Running, 10);
    harness.driver.push_status(RemoteScanState::Canceled, 10);
    let task_id = submit_untrusted(&harness).await;

    let w = worker(&harness, fast_config());
    dispatch_one(&w).await;

    let record = harness.store.get(&task_id).unwrap();
    assert_eq!(record.status, TaskStatus::Failed);
    assert!(record
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("canceled"));
    assert_eq!(harness.queue.dlq_depth("nessus").await.unwrap(), 1);
}

#[tokio::test]
async fn pending_and_running_states_keep_polling() {
    let harness = Harness::new();
    harness.driver.push_status(RemoteScanState::Pending, 0);
    harness.driver.push_status(RemoteScanState::Running, 50);
    // Script then drains to completed.
    let task_id = submit_untrusted(&harness).await;

    let w = worker(&harness, fast_config());
    dispatch_one(&w).await;
    assert_eq!(
        harness.store.get(&task_id).unwrap().status,
        TaskStatus::Completed
    );
}

#[tokio::test]
async fn deadline_exceeded_times_out_with_best_effort_stop() {
    let harness = Harness::new();
    harness.driver.run_forever();
    let task_id = submit_untrusted(&harness).await;

    let mut config = fast_config();
    config.task_deadline = Duration::from_secs(1);
    config.poll_interval = Duration::from_millis(1);
    let w = worker(&harness, config);

    let runner = w.clone();
    let handle = tokio::spawn(async move { dispatch_one(&runner).await });
    tokio::time::sleep(Duration::from_millis(30)).await;
    harness.clock.advance_ms(10_000);
    handle.await.unwrap();

    let record = harness.store.get(&task_id).unwrap();
    assert_eq!(record.status, TaskStatus::Timeout);
    assert!(record
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("deadline"));
    assert!(!harness.driver.stopped().is_empty());
    // Timeouts are terminal but not dead-lettered.
    assert_eq!(harness.queue.dlq_depth("nessus").await.unwrap(), 0);
}

#[tokio::test]
async fn no_capacity_re_enqueues_at_tail() {
    let harness = Harness::new();
    // Drain the whole pool: 2 instances x 2 slots.
    for i in 0..4 {
        harness.registry.acquire("nessus", None, i).unwrap();
    }
    let task_id = submit_untrusted(&harness).await;

    let w = worker(&harness, fast_config());
    assert!(dispatch_one(&w).await);

    assert_eq!(
        harness.store.get(&task_id).unwrap().status,
        TaskStatus::Queued
    );
    assert_eq!(harness.queue.depth("nessus").await.unwrap(), 1);
}

#[tokio::test]
async fn stale_entries_are_discarded() {
    let harness = Harness::new();
    // Entry without a record.
    harness
        .queue
        .enqueue(
            "nessus",
            scanq_queue::QueueEntry::new(scanq_core::TaskId::new("ghost"), "nessus", 1),
        )
        .await
        .unwrap();
    let w = worker(&harness, fast_config());
    assert!(dispatch_one(&w).await);

    // Entry for a task that already ran (idempotency/DLQ recovery window).
    let task_id = submit_untrusted(&harness).await;
    dispatch_one(&w).await;
    assert_eq!(
        harness.store.get(&task_id).unwrap().status,
        TaskStatus::Completed
    );
    harness
        .queue
        .enqueue(
            "nessus",
            scanq_queue::QueueEntry::new(task_id.clone(), "nessus", 2),
        )
        .await
        .unwrap();
    dispatch_one(&w).await;
    assert_eq!(
        harness.store.get(&task_id).unwrap().status,
        TaskStatus::Completed
    );
    assert_eq!(harness.driver.created_requests().len(), 1);
}

#[tokio::test]
async fn export_failure_is_permanent() {
    let harness = Harness::new();
    harness
        .driver
        .fail_export(scanq_scanner::DriverError::Permanent("export broke".to_string()));
    let task_id = submit_untrusted(&harness).await;

    let w = worker(&harness, fast_config());
    dispatch_one(&w).await;

    let record = harness.store.get(&task_id).unwrap();
    assert_eq!(record.status, TaskStatus::Failed);
    assert!(record
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("export"));
    assert_eq!(harness.queue.dlq_depth("nessus").await.unwrap(), 1);
}

#[tokio::test]
async fn undersized_artifact_fails_validation() {
    let harness = Harness::new();
    harness.driver.set_export_bytes(b"tiny".to_vec());
    let task_id = submit_untrusted(&harness).await;

    let w = worker(&harness, fast_config());
    dispatch_one(&w).await;

    let record = harness.store.get(&task_id).unwrap();
    assert_eq!(record.status, TaskStatus::Failed);
    assert!(record
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("minimum"));
}

#[tokio::test]
async fn create_failure_routes_to_dlq() {
    let harness = Harness::new();
    harness
        .driver
        .fail_create(scanq_scanner::DriverError::Permanent("bad policy".to_string()));
    let task_id = submit_untrusted(&harness).await;

    let w = worker(&harness, fast_config());
    dispatch_one(&w).await;

    let record = harness.store.get(&task_id).unwrap();
    assert_eq!(record.status, TaskStatus::Failed);
    let dead = harness.queue.peek_dlq("nessus", 10).await.unwrap();
    assert_eq!(dead[0].error_message, "create_scan failed: permanent remote error: bad policy");
    // Slot released even though the scan never launched.
    assert_eq!(
        harness.registry.pool_status("nessus").unwrap().in_flight_total,
        0
    );
}

#[tokio::test]
async fn run_loop_processes_until_shutdown() {
    let harness = Harness::new();
    let task_id = submit_untrusted(&harness).await;

    let w = worker(&harness, fast_config());
    let handle = tokio::spawn(w.run());

    let mut done = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        if harness.store.get(&task_id).unwrap().status == TaskStatus::Completed {
            done = true;
            break;
        }
    }
    assert!(done, "worker never completed the scan");

    harness.shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn worker_scoped_to_one_pool_leaves_others_alone() {
    let harness = Harness::new();
    // Three tasks for the default pool, one for the DMZ pool.
    for _ in 0..3 {
        submit_untrusted(&harness).await;
    }
    let dmz_task = submit_scan(
        &harness,
        SubmitRequest {
            scan_type: ScanType::Untrusted,
            payload: untrusted_payload(),
            scanner_pool: Some("nessus-dmz".to_string()),
            scanner_instance: None,
            idempotency_key: None,
        },
    )
    .await;

    let mut config = fast_config();
    config.pools = vec!["nessus-dmz".to_string()];
    let w = worker(&harness, config);
    assert!(dispatch_one(&w).await);

    assert_eq!(
        harness.store.get(&dmz_task).unwrap().status,
        TaskStatus::Completed
    );
    assert_eq!(harness.queue.depth("nessus").await.unwrap(), 3);
    assert_eq!(harness.queue.depth("nessus-dmz").await.unwrap(), 0);
}
