// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capability contract every remote scanner driver implements.

use crate::config::InstanceConfig;
use crate::registry::ScannerKind;
use async_trait::async_trait;
use scanq_core::{Credentials, ScanType};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Typed driver failures. Transient kinds are retried inside the driver or
/// the worker poll loop; permanent kinds land the task in FAILED.
#[derive(Debug, Clone, Error)]
pub enum DriverError {
    #[error("transient network error: {0}")]
    TransientNetwork(String),
    #[error("remote scanner busy: {0}")]
    RemoteBusy(String),
    #[error("remote authentication required: {0}")]
    AuthRequired(String),
    #[error("remote object not found: {0}")]
    NotFound(String),
    #[error("permanent remote error: {0}")]
    Permanent(String),
}

impl DriverError {
    /// Whether retrying the same call later can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DriverError::TransientNetwork(_) | DriverError::RemoteBusy(_)
        )
    }
}

/// Scan creation request handed to a driver. Credentials are carried by
/// value so the worker can drop the request (and the secrets with it) as
/// soon as the remote scan exists.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub name: String,
    pub description: Option<String>,
    pub targets: Vec<String>,
    pub scan_type: ScanType,
    pub credentials: Option<Credentials>,
}

/// Scan state as reported by the remote scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteScanState {
    Pending,
    Running,
    Paused,
    Completed,
    Canceled,
    Stopped,
    Aborted,
    Other(String),
}

impl RemoteScanState {
    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => RemoteScanState::Pending,
            "running" => RemoteScanState::Running,
            "paused" => RemoteScanState::Paused,
            "completed" => RemoteScanState::Completed,
            "canceled" | "cancelled" => RemoteScanState::Canceled,
            "stopped" => RemoteScanState::Stopped,
            "aborted" => RemoteScanState::Aborted,
            other => RemoteScanState::Other(other.to_string()),
        }
    }
}

impl fmt::Display for RemoteScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteScanState::Pending => write!(f, "pending"),
            RemoteScanState::Running => write!(f, "running"),
            RemoteScanState::Paused => write!(f, "paused"),
            RemoteScanState::Completed => write!(f, "completed"),
            RemoteScanState::Canceled => write!(f, "canceled"),
            RemoteScanState::Stopped => write!(f, "stopped"),
            RemoteScanState::Aborted => write!(f, "aborted"),
            RemoteScanState::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Remote state collapsed to what the task lifecycle cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappedState {
    Queued,
    Running,
    Completed,
    Failed,
}

/// Collapse a remote state per the lifecycle mapping table. States this
/// build does not know are treated as still running so polling continues.
pub fn map_remote_state(state: &RemoteScanState) -> MappedState {
    match state {
        RemoteScanState::Pending => MappedState::Queued,
        RemoteScanState::Running | RemoteScanState::Paused => MappedState::Running,
        RemoteScanState::Completed => MappedState::Completed,
        RemoteScanState::Canceled | RemoteScanState::Stopped | RemoteScanState::Aborted => {
            MappedState::Failed
        }
        RemoteScanState::Other(_) => MappedState::Running,
    }
}

/// Status snapshot from a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStatus {
    pub state: RemoteScanState,
    /// Remote progress percentage, 0..=100, best effort.
    pub progress: u8,
}

/// One remote scanner kind, adapted to the worker's capability set.
///
/// Remote session management is a driver concern: tokens are re-acquired on
/// 401/403 transparently to the caller.
#[async_trait]
pub trait ScannerDriver: Send + Sync {
    /// Create the remote scan and return its opaque handle.
    async fn create_scan(&self, request: &ScanRequest) -> Result<String, DriverError>;

    async fn launch_scan(&self, remote_scan_id: &str) -> Result<(), DriverError>;

    async fn get_status(&self, remote_scan_id: &str) -> Result<RemoteStatus, DriverError>;

    /// Obtain the native export, blocking through the remote's own
    /// request/poll/download flow with an internal timeout.
    async fn export_artifact(&self, remote_scan_id: &str) -> Result<Vec<u8>, DriverError>;

    /// Best effort.
    async fn stop_scan(&self, remote_scan_id: &str) -> Result<(), DriverError>;

    /// Best effort.
    async fn delete_scan(&self, remote_scan_id: &str) -> Result<(), DriverError>;
}

/// Produces a driver for a scanner instance of a given kind.
pub trait DriverFactory: Send + Sync {
    fn driver_for(
        &self,
        kind: ScannerKind,
        instance: &InstanceConfig,
    ) -> Result<Arc<dyn ScannerDriver>, DriverError>;
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
