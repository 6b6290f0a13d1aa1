// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker: dequeues tasks, drives the remote scan lifecycle, finalizes.
//!
//! One worker runs scans concurrently up to its global semaphore bound;
//! scanner-instance capacity is the narrower per-resource bound, enforced
//! by the registry. Within one scan the lifecycle steps run sequentially:
//! acquire -> RUNNING -> create -> launch -> poll -> export -> validate ->
//! terminal. The scanner slot is released on every exit path, and
//! credentials leave memory as soon as the remote scan exists.

use crate::validator::validate_artifact;
use scanq_core::{AuthenticationStatus, Clock, TaskRecord, TaskStatus, ValidationReport};
use scanq_queue::{QueueEntry, TaskQueue};
use scanq_scanner::{
    map_remote_state, DriverFactory, MappedState, RegistryError, ScanRequest, ScannerDriver,
    ScannerRegistry,
};
use scanq_store::TaskStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Worker tuning knobs.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Pools to dequeue from, in preference order. Empty means every pool
    /// the registry knows.
    pub pools: Vec<String>,
    pub dequeue_timeout: Duration,
    pub poll_interval: Duration,
    /// Wall-clock bound from RUNNING entry to completion.
    pub task_deadline: Duration,
    pub max_concurrent_scans: usize,
    /// Sleep after a NoCapacity re-enqueue.
    pub capacity_backoff: Duration,
    /// How long in-flight scans get to reach a safe point on shutdown.
    pub shutdown_grace: Duration,
    /// Transient export failures are retried this many times.
    pub export_attempts: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pools: Vec::new(),
            dequeue_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(30),
            task_deadline: Duration::from_secs(24 * 3600),
            max_concurrent_scans: 4,
            capacity_backoff: Duration::from_secs(2),
            shutdown_grace: Duration::from_secs(60),
            export_attempts: 3,
        }
    }
}

/// Releases a scanner slot when the scan bracket exits, on any path.
struct SlotGuard {
    registry: Arc<ScannerRegistry>,
    pool: String,
    instance_id: String,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.registry.release(&self.pool, &self.instance_id);
    }
}

enum PollOutcome {
    /// Remote scan completed; continue to export.
    Completed,
    /// Task already routed to a terminal state.
    Finished,
    /// Shutdown; task left RUNNING for recovery on next start.
    Interrupted,
}

/// The scan worker. Cheap to clone; clones share the semaphore and queue.
pub struct Worker<Q, F, C> {
    store: Arc<TaskStore>,
    queue: Arc<Q>,
    registry: Arc<ScannerRegistry>,
    factory: Arc<F>,
    clock: C,
    config: WorkerConfig,
    semaphore: Arc<Semaphore>,
    shutdown: watch::Receiver<bool>,
}

impl<Q, F, C: Clock> Clone for Worker<Q, F, C> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            queue: self.queue.clone(),
            registry: self.registry.clone(),
            factory: self.factory.clone(),
            clock: self.clock.clone(),
            config: self.config.clone(),
            semaphore: self.semaphore.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<Q, F, C> Worker<Q, F, C>
where
    Q: TaskQueue + Send + Sync + 'static,
    F: DriverFactory + Send + Sync + 'static,
    C: Clock,
{
    pub fn new(
        store: Arc<TaskStore>,
        queue: Arc<Q>,
        registry: Arc<ScannerRegistry>,
        factory: Arc<F>,
        clock: C,
        config: WorkerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_scans.max(1)));
        Self {
            store,
            queue,
            registry,
            factory,
            clock,
            config,
            semaphore,
            shutdown,
        }
    }

    fn dequeue_pools(&self) -> Vec<String> {
        if self.config.pools.is_empty() {
            self.registry.list_pools()
        } else {
            self.config.pools.clone()
        }
    }

    /// Main loop: permit -> dequeue -> spawn scan. Exits on shutdown, then
    /// gives in-flight scans the grace period to reach a safe point.
    pub async fn run(self) {
        let mut shutdown = self.shutdown.clone();
        let mut scans: JoinSet<()> = JoinSet::new();

        loop {
            if *shutdown.borrow() {
                break;
            }
            while scans.try_join_next().is_some() {}

            let permit = tokio::select! {
                permit = self.semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = shutdown.wait_for(|stop| *stop) => break,
            };
            if *shutdown.borrow() {
                break;
            }

            let pools = self.dequeue_pools();
            let dequeued = tokio::select! {
                result = self.queue.dequeue_any(&pools, self.config.dequeue_timeout) => result,
                _ = shutdown.wait_for(|stop| *stop) => break,
            };
            match dequeued {
                Ok(Some(entry)) => {
                    let worker = self.clone();
                    scans.spawn(async move {
                        worker.run_scan(entry, permit).await;
                    });
                }
                Ok(None) => drop(permit),
                Err(e) => {
                    warn!(error = %e, "dequeue failed, backing off");
                    drop(permit);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        let drain = async {
            while scans.join_next().await.is_some() {}
        };
        if tokio::time::timeout(self.config.shutdown_grace, drain)
            .await
            .is_err()
        {
            warn!("shutdown grace elapsed; abandoning in-flight scans for recovery");
            scans.abort_all();
        }
    }

    /// One scan lifecycle. The permit bounds worker-wide concurrency and is
    /// held until this returns.
    pub async fn run_scan(&self, entry: QueueEntry, _permit: OwnedSemaphorePermit) {
        // Reconcile against the store: queue depth and task state can
        // diverge briefly (idempotent replays, DLQ operations).
        let record = match self.store.get(&entry.task_id) {
            Ok(record) => record,
            Err(_) => {
                debug!(task_id = %entry.task_id, "dequeued entry without a record, discarding");
                return;
            }
        };
        if record.status != TaskStatus::Queued {
            debug!(task_id = %entry.task_id, status = %record.status, "task no longer queued, discarding");
            return;
        }

        let pinned = record
            .scanner_instance_pinned
            .then_some(record.scanner_instance_id.as_str());
        let acquired = match self
            .registry
            .acquire(&entry.scanner_pool, pinned, self.clock.epoch_ms())
        {
            Ok(acquired) => acquired,
            Err(RegistryError::NoCapacity(_)) => {
                debug!(task_id = %entry.task_id, pool = %entry.scanner_pool, "no capacity, re-enqueueing");
                tokio::time::sleep(self.config.capacity_backoff).await;
                if let Err(e) = self.queue.enqueue(&entry.scanner_pool, entry.clone()).await {
                    error!(task_id = %entry.task_id, error = %e, "re-enqueue failed");
                }
                return;
            }
            Err(e) => {
                self.fail_from(TaskStatus::Queued, &entry, &format!("no scanner available: {e}"))
                    .await;
                return;
            }
        };
        let _slot = SlotGuard {
            registry: self.registry.clone(),
            pool: acquired.pool.clone(),
            instance_id: acquired.config.instance_id.clone(),
        };

        let now = self.clock.now_utc();
        let instance_id = acquired.config.instance_id.clone();
        let mut record = match self.store.transition(
            &entry.task_id,
            TaskStatus::Queued,
            TaskStatus::Running,
            now,
            |r| {
                r.scanner_instance_id = instance_id.clone();
                r.heartbeat_at = Some(now);
            },
        ) {
            Ok(record) => record,
            Err(e) => {
                warn!(task_id = %entry.task_id, error = %e, "lost the QUEUED->RUNNING race, discarding");
                return;
            }
        };
        info!(
            task_id = %entry.task_id,
            trace_id = %record.trace_id,
            pool = %acquired.pool,
            instance = %acquired.config.instance_id,
            "scan dispatched"
        );

        let driver = match self.factory.driver_for(acquired.kind, &acquired.config) {
            Ok(driver) => driver,
            Err(e) => {
                self.fail_from(TaskStatus::Running, &entry, &format!("driver unavailable: {e}"))
                    .await;
                return;
            }
        };

        // Credentials leave memory when `request` drops at the end of this
        // block; the store scrubs the persisted copy with the remote id.
        let remote_scan_id = {
            let request = ScanRequest {
                name: record.payload.name.clone(),
                description: record.payload.description.clone(),
                targets: record.payload.target_list(),
                scan_type: record.scan_type,
                credentials: record.payload.credentials.clone(),
            };
            match driver.create_scan(&request).await {
                Ok(remote_scan_id) => remote_scan_id,
                Err(e) => {
                    self.fail_from(TaskStatus::Running, &entry, &format!("create_scan failed: {e}"))
                        .await;
                    return;
                }
            }
        };
        // The driver has the secrets now; drop them from this copy too (the
        // store scrubs the persisted one alongside the remote id).
        record.payload.scrub_credentials();
        if let Err(e) = self.store.record_remote_scan(&entry.task_id, &remote_scan_id) {
            self.fail_from(
                TaskStatus::Running,
                &entry,
                &format!("persisting remote scan id failed: {e}"),
            )
            .await;
            return;
        }

        if let Err(e) = driver.launch_scan(&remote_scan_id).await {
            self.fail_from(TaskStatus::Running, &entry, &format!("launch failed: {e}"))
                .await;
            return;
        }

        match self
            .poll_to_completion(&entry, driver.as_ref(), &remote_scan_id)
            .await
        {
            PollOutcome::Completed => {}
            PollOutcome::Finished | PollOutcome::Interrupted => return,
        }

        let bytes = match self
            .export_with_retries(driver.as_ref(), &remote_scan_id)
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                self.fail_from(TaskStatus::Running, &entry, &format!("export failed: {e}"))
                    .await;
                return;
            }
        };
        if let Err(e) = self.store.write_artifact(&entry.task_id, &bytes) {
            self.fail_from(TaskStatus::Running, &entry, &format!("artifact write failed: {e}"))
                .await;
            return;
        }

        let report = validate_artifact(record.scan_type, &bytes);
        self.finalize(&entry, &record, report).await;

        // The artifact is local now; the remote copy is clutter.
        if let Err(e) = driver.delete_scan(&remote_scan_id).await {
            debug!(task_id = %entry.task_id, error = %e, "remote scan delete failed");
        }
    }

    async fn poll_to_completion(
        &self,
        entry: &QueueEntry,
        driver: &dyn ScannerDriver,
        remote_scan_id: &str,
    ) -> PollOutcome {
        let mut shutdown = self.shutdown.clone();
        let started_ms = self.clock.epoch_ms();
        let deadline_ms = self.config.task_deadline.as_millis() as u64;

        loop {
            let shutting_down = tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => false,
                _ = shutdown.changed() => true,
            };
            if shutting_down && *shutdown.borrow() {
                info!(task_id = %entry.task_id, "shutdown during scan, leaving task RUNNING for recovery");
                if let Err(e) = driver.stop_scan(remote_scan_id).await {
                    debug!(task_id = %entry.task_id, error = %e, "best-effort stop failed");
                }
                return PollOutcome::Interrupted;
            }

            if let Err(e) = self.store.record_heartbeat(&entry.task_id, self.clock.now_utc()) {
                warn!(task_id = %entry.task_id, error = %e, "heartbeat write failed");
            }

            if self.clock.epoch_ms().saturating_sub(started_ms) > deadline_ms {
                if let Err(e) = driver.stop_scan(remote_scan_id).await {
                    debug!(task_id = %entry.task_id, error = %e, "best-effort stop failed");
                }
                self.timeout_task(entry).await;
                return PollOutcome::Finished;
            }

            match driver.get_status(remote_scan_id).await {
                Ok(status) => {
                    debug!(
                        task_id = %entry.task_id,
                        state = %status.state,
                        progress = status.progress,
                        "scan progress"
                    );
                    match map_remote_state(&status.state) {
                        MappedState::Completed => return PollOutcome::Completed,
                        MappedState::Failed => {
                            self.fail_from(
                                TaskStatus::Running,
                                entry,
                                &format!("remote scan ended in state {}", status.state),
                            )
                            .await;
                            return PollOutcome::Finished;
                        }
                        MappedState::Queued | MappedState::Running => {}
                    }
                }
                Err(e) if e.is_transient() => {
                    warn!(task_id = %entry.task_id, error = %e, "transient poll failure, will retry");
                }
                Err(e) => {
                    self.fail_from(TaskStatus::Running, entry, &format!("status poll failed: {e}"))
                        .await;
                    return PollOutcome::Finished;
                }
            }
        }
    }

    async fn export_with_retries(
        &self,
        driver: &dyn ScannerDriver,
        remote_scan_id: &str,
    ) -> Result<Vec<u8>, scanq_scanner::DriverError> {
        let mut attempt = 1;
        loop {
            match driver.export_artifact(remote_scan_id).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.is_transient() && attempt < self.config.export_attempts => {
                    warn!(error = %e, attempt, "transient export failure, retrying");
                    tokio::time::sleep(self.config.capacity_backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Decide the terminal state from the validation report and persist it.
    async fn finalize(&self, entry: &QueueEntry, record: &TaskRecord, report: ValidationReport) {
        let now = self.clock.now_utc();
        let auth = report.authentication_status;
        let summary = report.results_summary();
        let warnings = report.warnings.clone();

        let privileged_auth_failure = record.scan_type.is_privileged()
            && matches!(
                auth,
                AuthenticationStatus::Failed | AuthenticationStatus::Partial
            );

        if privileged_auth_failure {
            let error = match auth {
                AuthenticationStatus::Failed => {
                    "credentials failed on the target; privileged checks did not run"
                }
                _ => "privilege escalation was only partially effective",
            };
            let outcome = self.store.transition(
                &entry.task_id,
                TaskStatus::Running,
                TaskStatus::Failed,
                now,
                |r| {
                    r.authentication_status = Some(auth);
                    r.validation_warnings = warnings.clone();
                    r.results_summary = Some(summary.clone());
                    r.error_message = Some(error.to_string());
                },
            );
            if let Err(e) = outcome {
                error!(task_id = %entry.task_id, error = %e, "failed-state transition rejected");
            }
            self.dead_letter(entry, error).await;
            info!(task_id = %entry.task_id, authentication = %auth, "scan failed on credentials");
        } else if !report.is_valid {
            let error = report
                .error
                .clone()
                .unwrap_or_else(|| "artifact invalid".to_string());
            let outcome = self.store.transition(
                &entry.task_id,
                TaskStatus::Running,
                TaskStatus::Failed,
                now,
                |r| {
                    r.authentication_status = Some(auth);
                    r.error_message = Some(error.clone());
                },
            );
            if let Err(e) = outcome {
                error!(task_id = %entry.task_id, error = %e, "failed-state transition rejected");
            }
            self.dead_letter(entry, &error).await;
            info!(task_id = %entry.task_id, error, "scan artifact invalid");
        } else {
            let outcome = self.store.transition(
                &entry.task_id,
                TaskStatus::Running,
                TaskStatus::Completed,
                now,
                |r| {
                    r.authentication_status = Some(auth);
                    r.validation_warnings = warnings.clone();
                    r.results_summary = Some(summary.clone());
                },
            );
            match outcome {
                Ok(_) => info!(
                    task_id = %entry.task_id,
                    hosts = summary.host_count,
                    findings = summary.total_findings,
                    authentication = %auth,
                    "scan completed"
                ),
                Err(e) => {
                    error!(task_id = %entry.task_id, error = %e, "completed-state transition rejected")
                }
            }
        }
    }

    async fn fail_from(&self, from: TaskStatus, entry: &QueueEntry, error: &str) {
        let now = self.clock.now_utc();
        let outcome = self
            .store
            .transition(&entry.task_id, from, TaskStatus::Failed, now, |r| {
                r.error_message = Some(error.to_string());
            });
        if let Err(e) = outcome {
            warn!(task_id = %entry.task_id, error = %e, "failed-state transition rejected");
        }
        self.dead_letter(entry, error).await;
        info!(task_id = %entry.task_id, error, "scan failed");
    }

    async fn timeout_task(&self, entry: &QueueEntry) {
        let hours = self.config.task_deadline.as_secs() / 3600;
        let error = format!("scan exceeded its {hours}h per-task deadline");
        let now = self.clock.now_utc();
        let outcome =
            self.store
                .transition(&entry.task_id, TaskStatus::Running, TaskStatus::Timeout, now, |r| {
                    r.error_message = Some(error.clone());
                });
        if let Err(e) = outcome {
            warn!(task_id = %entry.task_id, error = %e, "timeout transition rejected");
        }
        info!(task_id = %entry.task_id, error, "scan timed out");
    }

    async fn dead_letter(&self, entry: &QueueEntry, error: &str) {
        if let Err(e) = self
            .queue
            .move_to_dlq(&entry.scanner_pool, entry, error, self.clock.epoch_ms())
            .await
        {
            error!(task_id = %entry.task_id, error = %e, "dead-letter move failed");
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
