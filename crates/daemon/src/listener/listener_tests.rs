// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::protocol::{Request, Response};
use scanq_core::test_support::{queued_record, untrusted_payload};
use scanq_core::{ScanType, TaskId, TaskStatus};
use scanq_queue::MemoryQueue;
use scanq_scanner::{InstanceConfig, PoolMap};
use std::collections::BTreeMap;
use tempfile::TempDir;

fn pool_map() -> PoolMap {
    let mut pools = PoolMap::new();
    pools.insert(
        "nessus".to_string(),
        vec![InstanceConfig {
            instance_id: "scanner-01".to_string(),
            name: "Primary".to_string(),
            endpoint: "https://scanner-01.internal:8834".to_string(),
            username: "svc".to_string(),
            password: "pw".to_string(),
            max_concurrent: 2,
            enabled: true,
        }],
    );
    pools
}

fn context() -> (TempDir, Arc<AppContext<MemoryQueue>>) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(TaskStore::open(dir.path().join("tasks")).unwrap());
    let (shutdown_tx, _shutdown_rx) = watch::channel(false);
    let ctx = AppContext {
        store,
        queue: Arc::new(MemoryQueue::new()),
        registry: Arc::new(ScannerRegistry::new(pool_map())),
        clock: SystemClock,
        scanners_file: None,
        started_at_ms: SystemClock.epoch_ms(),
        shutdown: Arc::new(shutdown_tx),
    };
    (dir, Arc::new(ctx))
}

/// Minimal parseable export, comfortably above the validator's size floor.
fn artifact() -> Vec<u8> {
    let items: String = (0..3)
        .map(|i| {
            format!(
                r#"<ReportItem port="22" svc_name="ssh" protocol="tcp" severity="{i}" pluginID="{}" pluginName="Finding {i}" pluginFamily="General"><risk_factor>None</risk_factor></ReportItem>"#,
                1000 + i
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" ?><NessusClientData_v2><Report name="listener-fixture"><ReportHost name="10.0.0.5"><HostProperties><tag name="host-ip">10.0.0.5</tag></HostProperties>{items}</ReportHost></Report></NessusClientData_v2>"#
    )
    .into_bytes()
}

fn completed_task(ctx: &AppContext<MemoryQueue>, id: &str) -> TaskId {
    let record = queued_record(id, ScanType::Untrusted, untrusted_payload());
    ctx.store.create(&record).unwrap();
    let now = chrono::Utc::now();
    ctx.store
        .transition(&record.task_id, TaskStatus::Queued, TaskStatus::Running, now, |_| {})
        .unwrap();
    ctx.store.write_artifact(&record.task_id, &artifact()).unwrap();
    ctx.store
        .transition(&record.task_id, TaskStatus::Running, TaskStatus::Completed, now, |_| {})
        .unwrap();
    record.task_id
}

fn untrusted_request() -> Request {
    Request::RunUntrustedScan {
        targets: "192.168.1.0/24".to_string(),
        name: "S1".to_string(),
        description: None,
        schema_profile: None,
        scanner_pool: Some("nessus".to_string()),
        scanner_instance: None,
        idempotency_key: None,
    }
}

#[tokio::test]
async fn ping_reports_version() {
    let (_dir, ctx) = context();
    match handle_request(&ctx, Request::Ping).await {
        Response::Pong { version, .. } => assert_eq!(version, PROTOCOL_VERSION),
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn untrusted_submission_queues_a_task() {
    let (_dir, ctx) = context();
    let receipt = match handle_request(&ctx, untrusted_request()).await {
        Response::ScanQueued(receipt) => receipt,
        other => panic!("unexpected response: {other:?}"),
    };
    assert_eq!(receipt.status, TaskStatus::Queued);
    assert_eq!(receipt.scanner_pool, "nessus");
    assert_eq!(receipt.queue_position, 1);
    assert_eq!(ctx.queue.depth("nessus").await.unwrap(), 1);

    // The task shows up in listings.
    match handle_request(
        &ctx,
        Request::ListTasks {
            limit: None,
            status_filter: Some("queued".to_string()),
            scanner_pool: None,
            target_filter: None,
        },
    )
    .await
    {
        Response::Tasks { count, tasks } => {
            assert_eq!(count, 1);
            assert_eq!(tasks[0].task_id, receipt.task_id);
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn authenticated_submission_validates_scan_type_and_escalation() {
    let (_dir, ctx) = context();
    let base = |scan_type: &str, method: Option<&str>| Request::RunAuthenticatedScan {
        targets: "10.0.0.5".to_string(),
        name: "cred".to_string(),
        scan_type: scan_type.to_string(),
        ssh_username: "svc".to_string(),
        ssh_password: "pw".to_string(),
        elevate_privileges_with: method.map(str::to_string),
        escalation_account: None,
        escalation_password: method.map(|_| "esc".to_string()),
        description: None,
        schema_profile: None,
        scanner_pool: None,
        scanner_instance: None,
        idempotency_key: None,
    };

    match handle_request(&ctx, base("authenticated", None)).await {
        Response::ScanQueued(receipt) => assert_eq!(receipt.status, TaskStatus::Queued),
        other => panic!("unexpected response: {other:?}"),
    }

    match handle_request(&ctx, base("untrusted", None)).await {
        Response::Error { status_code, .. } => assert_eq!(status_code, Some(400)),
        other => panic!("unexpected response: {other:?}"),
    }

    // Privileged without an escalation method fails validation.
    match handle_request(&ctx, base("authenticated_privileged", None)).await {
        Response::Error { status_code, .. } => assert_eq!(status_code, Some(400)),
        other => panic!("unexpected response: {other:?}"),
    }

    match handle_request(&ctx, base("authenticated_privileged", Some("pbrun"))).await {
        Response::ScanQueued(_) => {}
        other => panic!("unexpected response: {other:?}"),
    }

    match handle_request(&ctx, base("authenticated_privileged", Some("doas"))).await {
        Response::Error { status_code, .. } => assert_eq!(status_code, Some(400)),
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn idempotency_conflict_surfaces_as_409() {
    let (_dir, ctx) = context();
    let with_key = |targets: &str| Request::RunUntrustedScan {
        targets: targets.to_string(),
        name: "S".to_string(),
        description: None,
        schema_profile: None,
        scanner_pool: None,
        scanner_instance: None,
        idempotency_key: Some("k1".to_string()),
    };

    let first = match handle_request(&ctx, with_key("10.0.0.1")).await {
        Response::ScanQueued(receipt) => receipt,
        other => panic!("unexpected response: {other:?}"),
    };
    match handle_request(&ctx, with_key("10.0.0.1")).await {
        Response::ScanQueued(receipt) => assert_eq!(receipt.task_id, first.task_id),
        other => panic!("unexpected response: {other:?}"),
    }
    match handle_request(&ctx, with_key("10.99.0.1")).await {
        Response::Error { status_code, message, .. } => {
            assert_eq!(status_code, Some(409));
            assert!(message.contains(first.task_id.as_str()));
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn status_of_unknown_task_is_404() {
    let (_dir, ctx) = context();
    match handle_request(
        &ctx,
        Request::GetScanStatus {
            task_id: "ghost".to_string(),
        },
    )
    .await
    {
        Response::Error { error, status_code, .. } => {
            assert_eq!(error, "not_found");
            assert_eq!(status_code, Some(404));
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn results_stream_for_a_completed_task() {
    let (_dir, ctx) = context();
    let task_id = completed_task(&ctx, "t-done");

    let response = handle_request(
        &ctx,
        Request::GetScanResults {
            task_id: task_id.to_string(),
            page: 1,
            page_size: 40,
            schema_profile: Some("brief".to_string()),
            custom_fields: None,
            filters: BTreeMap::new(),
        },
    )
    .await;
    let content = match response {
        Response::ScanResults { content, .. } => content,
        other => panic!("unexpected response: {other:?}"),
    };
    let first: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
    assert_eq!(first["type"], "schema");
    assert_eq!(first["total_vulnerabilities"], 3);
    let last: serde_json::Value = serde_json::from_str(content.lines().last().unwrap()).unwrap();
    assert_eq!(last["type"], "pagination");
    assert_eq!(last["page_size"], 40);
}

#[tokio::test]
async fn results_for_task_without_artifact_is_404() {
    let (_dir, ctx) = context();
    let record = queued_record("t-wait", ScanType::Untrusted, untrusted_payload());
    ctx.store.create(&record).unwrap();

    match handle_request(
        &ctx,
        Request::GetScanResults {
            task_id: "t-wait".to_string(),
            page: 0,
            page_size: 0,
            schema_profile: None,
            custom_fields: None,
            filters: BTreeMap::new(),
        },
    )
    .await
    {
        Response::Error { status_code, .. } => assert_eq!(status_code, Some(404)),
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn pool_and_scanner_queries() {
    let (_dir, ctx) = context();
    match handle_request(&ctx, Request::ListPools).await {
        Response::Pools { pools, default_pool } => {
            assert_eq!(pools, vec!["nessus"]);
            assert_eq!(default_pool, "nessus");
        }
        other => panic!("unexpected response: {other:?}"),
    }

    match handle_request(&ctx, Request::ListScanners { scanner_pool: None }).await {
        Response::Scanners { scanners } => {
            assert_eq!(scanners.len(), 1);
            assert_eq!(scanners[0].instance_id, "scanner-01");
        }
        other => panic!("unexpected response: {other:?}"),
    }

    match handle_request(
        &ctx,
        Request::GetPoolStatus {
            scanner_pool: Some("nessus".to_string()),
        },
    )
    .await
    {
        Response::PoolStatus { pools } => {
            assert_eq!(pools[0].scanner_count, 1);
            assert_eq!(pools[0].in_flight_total, 0);
        }
        other => panic!("unexpected response: {other:?}"),
    }

    match handle_request(
        &ctx,
        Request::GetPoolStatus {
            scanner_pool: Some("ghost".to_string()),
        },
    )
    .await
    {
        Response::Error { .. } => {}
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn queue_and_dlq_queries() {
    let (_dir, ctx) = context();
    handle_request(&ctx, untrusted_request()).await;
    let entry = scanq_queue::QueueEntry::new(TaskId::new("t-dead"), "nessus", 1);
    ctx.queue
        .move_to_dlq("nessus", &entry, "remote exploded", 50)
        .await
        .unwrap();

    match handle_request(&ctx, Request::GetQueueStatus { scanner_pool: None }).await {
        Response::QueueStatus { queues } => {
            assert_eq!(queues.len(), 1);
            assert_eq!(queues[0].queue_depth, 1);
            assert_eq!(queues[0].dlq_depth, 1);
        }
        other => panic!("unexpected response: {other:?}"),
    }

    match handle_request(
        &ctx,
        Request::GetDlqStatus {
            scanner_pool: Some("nessus".to_string()),
            limit: None,
        },
    )
    .await
    {
        Response::DlqStatus { pools } => {
            assert_eq!(pools[0].entries.len(), 1);
            assert_eq!(pools[0].entries[0].error_message, "remote exploded");
        }
        other => panic!("unexpected response: {other:?}"),
    }

    match handle_request(
        &ctx,
        Request::RemoveFromDlq {
            scanner_pool: "nessus".to_string(),
            task_id: "t-dead".to_string(),
        },
    )
    .await
    {
        Response::DlqRemoved { removed } => assert!(removed),
        other => panic!("unexpected response: {other:?}"),
    }

    match handle_request(
        &ctx,
        Request::ClearDlq {
            scanner_pool: "nessus".to_string(),
            before_ms: None,
        },
    )
    .await
    {
        Response::DlqCleared { cleared } => assert_eq!(cleared, 0),
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn reload_scanners_swaps_the_registry() {
    let (dir, ctx) = context();
    let path = dir.path().join("scanners.yaml");
    std::fs::write(
        &path,
        r#"
nessus:
  - instance_id: scanner-09
    name: Replacement
    endpoint: https://scanner-09.internal:8834
    username: svc
    password: pw
"#,
    )
    .unwrap();

    // No file configured -> reload refuses.
    match handle_request(&ctx, Request::ReloadScanners).await {
        Response::Error { status_code, .. } => assert_eq!(status_code, Some(400)),
        other => panic!("unexpected response: {other:?}"),
    }

    let mut ctx = Arc::try_unwrap(ctx).unwrap_or_else(|_| panic!("ctx still shared"));
    ctx.scanners_file = Some(path);
    match handle_request(&ctx, Request::ReloadScanners).await {
        Response::ScannersReloaded { pools } => assert_eq!(pools, vec!["nessus"]),
        other => panic!("unexpected response: {other:?}"),
    }
    let instances = ctx.registry.instances("nessus").unwrap();
    assert_eq!(instances[0].instance_id, "scanner-09");
}

#[tokio::test]
async fn shutdown_request_flips_the_signal() {
    let (_dir, ctx) = context();
    let mut rx = ctx.shutdown.subscribe();
    match handle_request(&ctx, Request::Shutdown).await {
        Response::ShuttingDown => {}
        other => panic!("unexpected response: {other:?}"),
    }
    assert!(*rx.borrow_and_update());
}

#[tokio::test]
async fn serve_round_trips_over_a_real_socket() {
    let (dir, ctx) = context();
    let socket_path = dir.path().join("scanqd.sock");
    let (tx, rx) = watch::channel(false);
    let server = tokio::spawn(serve(socket_path.clone(), ctx, rx));

    // Wait for the socket to appear.
    for _ in 0..100 {
        if socket_path.exists() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let stream = UnixStream::connect(&socket_path).await.unwrap();
    let (mut reader, mut writer) = stream.into_split();
    write_message(&mut writer, &Request::Ping).await.unwrap();
    let response: Option<Response> = read_message(&mut reader).await.unwrap();
    assert!(matches!(response, Some(Response::Pong { .. })));

    tx.send(true).unwrap();
    server.await.unwrap().unwrap();
    assert!(!socket_path.exists());
}
