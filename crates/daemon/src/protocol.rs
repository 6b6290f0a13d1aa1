// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol for the tool-invocation surface.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload, see
//! [`crate::protocol_wire`]. The `type` tag of each request matches the
//! published tool name (`run_untrusted_scan`, `get_scan_status`, ...).

use scanq_engine::{SubmitReceipt, TaskStatusView, TaskSummary};
use scanq_queue::DeadLetterEntry;
use scanq_scanner::{InstanceSnapshot, PoolStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Protocol version (from Cargo.toml)
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Request from a tool client to the daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Health check ping
    Ping,

    /// Queue an unauthenticated network scan
    RunUntrustedScan {
        targets: String,
        name: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        schema_profile: Option<String>,
        #[serde(default)]
        scanner_pool: Option<String>,
        #[serde(default)]
        scanner_instance: Option<String>,
        #[serde(default)]
        idempotency_key: Option<String>,
    },

    /// Queue a credentialed scan (`scan_type` is `authenticated` or
    /// `authenticated_privileged`)
    RunAuthenticatedScan {
        targets: String,
        name: String,
        scan_type: String,
        ssh_username: String,
        ssh_password: String,
        #[serde(default)]
        elevate_privileges_with: Option<String>,
        #[serde(default)]
        escalation_account: Option<String>,
        #[serde(default)]
        escalation_password: Option<String>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        schema_profile: Option<String>,
        #[serde(default)]
        scanner_pool: Option<String>,
        #[serde(default)]
        scanner_instance: Option<String>,
        #[serde(default)]
        idempotency_key: Option<String>,
    },

    GetScanStatus {
        task_id: String,
    },

    /// Stream stored results as newline-delimited JSON
    GetScanResults {
        task_id: String,
        /// 0 returns everything with no pagination line
        #[serde(default)]
        page: u32,
        #[serde(default)]
        page_size: u32,
        #[serde(default)]
        schema_profile: Option<String>,
        #[serde(default)]
        custom_fields: Option<Vec<String>>,
        #[serde(default)]
        filters: BTreeMap<String, String>,
    },

    ListTasks {
        #[serde(default)]
        limit: Option<usize>,
        #[serde(default)]
        status_filter: Option<String>,
        #[serde(default)]
        scanner_pool: Option<String>,
        #[serde(default)]
        target_filter: Option<String>,
    },

    ListScanners {
        #[serde(default)]
        scanner_pool: Option<String>,
    },

    ListPools,

    GetPoolStatus {
        #[serde(default)]
        scanner_pool: Option<String>,
    },

    GetQueueStatus {
        #[serde(default)]
        scanner_pool: Option<String>,
    },

    /// Peek dead letters, most recent first
    GetDlqStatus {
        #[serde(default)]
        scanner_pool: Option<String>,
        #[serde(default)]
        limit: Option<usize>,
    },

    RemoveFromDlq {
        scanner_pool: String,
        task_id: String,
    },

    /// Drop dead letters, optionally only those failed before `before_ms`
    ClearDlq {
        scanner_pool: String,
        #[serde(default)]
        before_ms: Option<u64>,
    },

    /// Re-read the scanner registry file
    ReloadScanners,

    /// Request daemon shutdown
    Shutdown,
}

impl Request {
    /// Tool name for logging. Never log the request itself: authenticated
    /// submissions carry credentials.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Ping => "ping",
            Request::RunUntrustedScan { .. } => "run_untrusted_scan",
            Request::RunAuthenticatedScan { .. } => "run_authenticated_scan",
            Request::GetScanStatus { .. } => "get_scan_status",
            Request::GetScanResults { .. } => "get_scan_results",
            Request::ListTasks { .. } => "list_tasks",
            Request::ListScanners { .. } => "list_scanners",
            Request::ListPools => "list_pools",
            Request::GetPoolStatus { .. } => "get_pool_status",
            Request::GetQueueStatus { .. } => "get_queue_status",
            Request::GetDlqStatus { .. } => "get_dlq_status",
            Request::RemoveFromDlq { .. } => "remove_from_dlq",
            Request::ClearDlq { .. } => "clear_dlq",
            Request::ReloadScanners => "reload_scanners",
            Request::Shutdown => "shutdown",
        }
    }
}

/// Per-pool queue depth snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueStatusEntry {
    pub pool: String,
    pub queue_depth: u64,
    pub dlq_depth: u64,
}

/// Per-pool dead-letter page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DlqStatusEntry {
    pub pool: String,
    pub entries: Vec<DeadLetterEntry>,
}

/// Response from the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Pong {
        version: String,
        uptime_secs: u64,
    },
    ScanQueued(SubmitReceipt),
    ScanStatus(TaskStatusView),
    /// `content` is the newline-delimited JSON stream
    ScanResults {
        task_id: String,
        content: String,
    },
    Tasks {
        tasks: Vec<TaskSummary>,
        count: usize,
    },
    Scanners {
        scanners: Vec<InstanceSnapshot>,
    },
    Pools {
        pools: Vec<String>,
        default_pool: String,
    },
    PoolStatus {
        pools: Vec<PoolStatus>,
    },
    QueueStatus {
        queues: Vec<QueueStatusEntry>,
    },
    DlqStatus {
        pools: Vec<DlqStatusEntry>,
    },
    DlqRemoved {
        removed: bool,
    },
    DlqCleared {
        cleared: u64,
    },
    ScannersReloaded {
        pools: Vec<String>,
    },
    ShuttingDown,
    Error {
        error: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },
}

impl Response {
    /// Error envelope from an engine failure.
    pub fn from_engine_error(e: &scanq_engine::EngineError) -> Self {
        use scanq_engine::EngineError;
        let error = match e {
            EngineError::Validation(_) => "validation_error",
            EngineError::Conflict { .. } => "conflict",
            EngineError::NotFound(_) => "not_found",
            EngineError::NoCapacity(_) => "no_capacity",
            EngineError::Registry(_) => "registry_error",
            EngineError::Artifact(_) => "artifact_error",
            EngineError::Store(_) => "storage_error",
            EngineError::Queue(_) => "queue_error",
            EngineError::Driver(_) => "scanner_error",
        };
        Response::Error {
            error: error.to_string(),
            message: e.to_string(),
            status_code: e.status_code(),
        }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
