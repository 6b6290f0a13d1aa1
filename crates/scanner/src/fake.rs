// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted fake driver for testing worker lifecycles.
#![cfg_attr(coverage_nightly, coverage(off))]

use crate::config::InstanceConfig;
use crate::driver::{
    DriverError, DriverFactory, RemoteScanState, RemoteStatus, ScanRequest, ScannerDriver,
};
use crate::registry::ScannerKind;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

struct FakeState {
    statuses: VecDeque<RemoteStatus>,
    /// When set, `get_status` re-queues the status it pops so the script
    /// never drains (a scan that runs forever).
    sticky_statuses: bool,
    export_bytes: Vec<u8>,
    create_error: Option<DriverError>,
    export_error: Option<DriverError>,
    created: Vec<ScanRequest>,
    launched: Vec<String>,
    stopped: Vec<String>,
    deleted: Vec<String>,
    next_id: u64,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            statuses: VecDeque::new(),
            sticky_statuses: false,
            export_bytes: Vec::new(),
            create_error: None,
            export_error: None,
            created: Vec::new(),
            launched: Vec::new(),
            stopped: Vec::new(),
            deleted: Vec::new(),
            next_id: 1,
        }
    }
}

/// Fake scanner driver: scripted status sequence, canned export bytes,
/// recorded capability calls.
#[derive(Clone, Default)]
pub struct FakeScannerDriver {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeScannerDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a status to be returned by the next `get_status` call. When
    /// the script runs dry the driver reports completed at 100%.
    pub fn push_status(&self, state: RemoteScanState, progress: u8) {
        self.inner
            .lock()
            .statuses
            .push_back(RemoteStatus { state, progress });
    }

    /// Report `running` forever (the script never drains).
    pub fn run_forever(&self) {
        let mut inner = self.inner.lock();
        inner.statuses.clear();
        inner.statuses.push_back(RemoteStatus {
            state: RemoteScanState::Running,
            progress: 50,
        });
        inner.sticky_statuses = true;
    }

    pub fn set_export_bytes(&self, bytes: impl Into<Vec<u8>>) {
        self.inner.lock().export_bytes = bytes.into();
    }

    pub fn fail_create(&self, error: DriverError) {
        self.inner.lock().create_error = Some(error);
    }

    pub fn fail_export(&self, error: DriverError) {
        self.inner.lock().export_error = Some(error);
    }

    pub fn created_requests(&self) -> Vec<ScanRequest> {
        self.inner.lock().created.clone()
    }

    pub fn launched(&self) -> Vec<String> {
        self.inner.lock().launched.clone()
    }

    pub fn stopped(&self) -> Vec<String> {
        self.inner.lock().stopped.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.inner.lock().deleted.clone()
    }
}

#[async_trait]
impl ScannerDriver for FakeScannerDriver {
    async fn create_scan(&self, request: &ScanRequest) -> Result<String, DriverError> {
        let mut inner = self.inner.lock();
        if let Some(error) = inner.create_error.clone() {
            return Err(error);
        }
        inner.created.push(request.clone());
        let id = inner.next_id;
        inner.next_id += 1;
        Ok(format!("fake-scan-{id}"))
    }

    async fn launch_scan(&self, remote_scan_id: &str) -> Result<(), DriverError> {
        self.inner.lock().launched.push(remote_scan_id.to_string());
        Ok(())
    }

    async fn get_status(&self, _remote_scan_id: &str) -> Result<RemoteStatus, DriverError> {
        let mut inner = self.inner.lock();
        let sticky = inner.sticky_statuses;
        match inner.statuses.pop_front() {
            Some(status) => {
                if sticky {
                    inner.statuses.push_back(status.clone());
                }
                Ok(status)
            }
            None => Ok(RemoteStatus {
                state: RemoteScanState::Completed,
                progress: 100,
            }),
        }
    }

    async fn export_artifact(&self, _remote_scan_id: &str) -> Result<Vec<u8>, DriverError> {
        let inner = self.inner.lock();
        if let Some(error) = inner.export_error.clone() {
            return Err(error);
        }
        Ok(inner.export_bytes.clone())
    }

    async fn stop_scan(&self, remote_scan_id: &str) -> Result<(), DriverError> {
        self.inner.lock().stopped.push(remote_scan_id.to_string());
        Ok(())
    }

    async fn delete_scan(&self, remote_scan_id: &str) -> Result<(), DriverError> {
        self.inner.lock().deleted.push(remote_scan_id.to_string());
        Ok(())
    }
}

/// Factory that hands the same fake driver to every instance.
#[derive(Clone, Default)]
pub struct FakeDriverFactory {
    pub driver: FakeScannerDriver,
}

impl FakeDriverFactory {
    pub fn new(driver: FakeScannerDriver) -> Self {
        Self { driver }
    }
}

impl DriverFactory for FakeDriverFactory {
    fn driver_for(
        &self,
        _kind: ScannerKind,
        _instance: &InstanceConfig,
    ) -> Result<Arc<dyn ScannerDriver>, DriverError> {
        Ok(Arc::new(self.driver.clone()))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
