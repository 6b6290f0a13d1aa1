// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Directory-per-task store with serialized state transitions.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use scanq_core::{any_target_matches, can_transition, TaskId, TaskRecord, TaskStatus};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Metadata record filename inside a task directory.
pub const RECORD_FILE: &str = "task.json";

/// Native scanner export filename inside a task directory.
pub const ARTIFACT_FILE: &str = "scan_export.nessus";

/// Errors from task store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task already exists: {0}")]
    AlreadyExists(String),
    #[error("task not found: {0}")]
    NotFound(String),
    #[error("invalid transition for {task_id}: {from} -> {to} (current: {current})")]
    InvalidTransition {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
        current: TaskStatus,
    },
    #[error("artifact not found for task: {0}")]
    ArtifactNotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// In-memory filter applied by [`TaskStore::list`].
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub pool: Option<String>,
    /// IP, CIDR, or hostname query matched against stored targets.
    pub target: Option<String>,
    pub limit: Option<usize>,
}

/// Persistent home for task records and scan artifacts.
pub struct TaskStore {
    root: PathBuf,
    /// Per-task locks serializing read-modify-write transitions.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TaskStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn task_dir(&self, task_id: &str) -> PathBuf {
        self.root.join(task_id)
    }

    fn record_path(&self, task_id: &str) -> PathBuf {
        self.task_dir(task_id).join(RECORD_FILE)
    }

    /// Path of the native export for a task (whether or not it exists yet).
    pub fn artifact_path(&self, task_id: &TaskId) -> PathBuf {
        self.task_dir(task_id.as_str()).join(ARTIFACT_FILE)
    }

    fn lock_for(&self, task_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry(task_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Atomic write: temp file in the task dir, sync, rename over the target.
    fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let tmp_path = path.with_extension("tmp");
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(bytes)?;
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    fn save_record(&self, record: &TaskRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(record)?;
        Self::write_atomic(&self.record_path(record.task_id.as_str()), &bytes)
    }

    fn load_record(&self, task_id: &str) -> Result<TaskRecord, StoreError> {
        let path = self.record_path(task_id);
        if !path.exists() {
            return Err(StoreError::NotFound(task_id.to_string()));
        }
        let bytes = fs::read(&path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Create a task. Fails if the task directory already holds a record.
    pub fn create(&self, record: &TaskRecord) -> Result<(), StoreError> {
        let task_id = record.task_id.as_str();
        let _guard = self.lock_for(task_id);
        let _held = _guard.lock();
        if self.record_path(task_id).exists() {
            return Err(StoreError::AlreadyExists(task_id.to_string()));
        }
        fs::create_dir_all(self.task_dir(task_id))?;
        self.save_record(record)
    }

    pub fn get(&self, task_id: &TaskId) -> Result<TaskRecord, StoreError> {
        self.load_record(task_id.as_str())
    }

    /// Atomic read-modify-write state transition.
    ///
    /// Fails with [`StoreError::InvalidTransition`] if the current status is
    /// not `from` or the `(from, to)` pair is not allowed. On success the
    /// record's status and entry timestamp are updated, `apply` runs on the
    /// record under the per-task lock, and the result is persisted
    /// atomically. Any I/O failure leaves the on-disk pre-image intact.
    pub fn transition(
        &self,
        task_id: &TaskId,
        from: TaskStatus,
        to: TaskStatus,
        now: DateTime<Utc>,
        apply: impl FnOnce(&mut TaskRecord),
    ) -> Result<TaskRecord, StoreError> {
        let guard = self.lock_for(task_id.as_str());
        let _held = guard.lock();

        let mut record = self.load_record(task_id.as_str())?;
        if record.status != from || !can_transition(from, to) {
            return Err(StoreError::InvalidTransition {
                task_id: task_id.to_string(),
                from,
                to,
                current: record.status,
            });
        }

        record.status = to;
        if to == TaskStatus::Running {
            record.started_at = Some(now);
        }
        if to.is_terminal() {
            record.completed_at = Some(now);
        }
        apply(&mut record);

        self.save_record(&record)?;
        Ok(record)
    }

    /// Persist the remote scan handle and scrub credentials in one write.
    ///
    /// `remote_scan_id` is set once; a repeat call with the same handle is a
    /// no-op and a differing handle is rejected as an invalid mutation.
    pub fn record_remote_scan(
        &self,
        task_id: &TaskId,
        remote_scan_id: &str,
    ) -> Result<(), StoreError> {
        let guard = self.lock_for(task_id.as_str());
        let _held = guard.lock();

        let mut record = self.load_record(task_id.as_str())?;
        match record.remote_scan_id.as_deref() {
            Some(existing) if existing == remote_scan_id => return Ok(()),
            Some(existing) => {
                warn!(
                    task_id = %task_id,
                    existing,
                    attempted = remote_scan_id,
                    "refusing to overwrite remote_scan_id"
                );
                return Ok(());
            }
            None => {}
        }
        record.remote_scan_id = Some(remote_scan_id.to_string());
        record.payload.scrub_credentials();
        self.save_record(&record)
    }

    /// Refresh the worker heartbeat on a RUNNING task.
    pub fn record_heartbeat(&self, task_id: &TaskId, now: DateTime<Utc>) -> Result<(), StoreError> {
        let guard = self.lock_for(task_id.as_str());
        let _held = guard.lock();

        let mut record = self.load_record(task_id.as_str())?;
        if record.status != TaskStatus::Running {
            return Ok(());
        }
        record.heartbeat_at = Some(now);
        self.save_record(&record)
    }

    /// Write the native export atomically next to the record.
    pub fn write_artifact(&self, task_id: &TaskId, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let path = self.artifact_path(task_id);
        if !self.record_path(task_id.as_str()).exists() {
            return Err(StoreError::NotFound(task_id.to_string()));
        }
        Self::write_atomic(&path, bytes)?;
        Ok(path)
    }

    pub fn read_artifact(&self, task_id: &TaskId) -> Result<Vec<u8>, StoreError> {
        let path = self.artifact_path(task_id);
        if !path.exists() {
            return Err(StoreError::ArtifactNotFound(task_id.to_string()));
        }
        Ok(fs::read(path)?)
    }

    /// Size in bytes of the stored artifact, if present.
    pub fn artifact_size(&self, task_id: &TaskId) -> Option<u64> {
        fs::metadata(self.artifact_path(task_id)).ok().map(|m| m.len())
    }

    /// Iterate all tasks, applying `filter` in memory.
    ///
    /// Corrupt or mid-write records are skipped with a warning. Results are
    /// sorted newest-first by `created_at`.
    pub fn list(&self, filter: &TaskFilter) -> Result<Vec<TaskRecord>, StoreError> {
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let task_id = entry.file_name().to_string_lossy().to_string();
            let record = match self.load_record(&task_id) {
                Ok(record) => record,
                Err(StoreError::NotFound(_)) => continue,
                Err(e) => {
                    warn!(task_id, error = %e, "skipping unreadable task record");
                    continue;
                }
            };
            if let Some(status) = filter.status {
                if record.status != status {
                    continue;
                }
            }
            if let Some(pool) = &filter.pool {
                if &record.scanner_pool != pool {
                    continue;
                }
            }
            if let Some(target) = &filter.target {
                if !any_target_matches(&record.payload.targets, target) {
                    continue;
                }
            }
            records.push(record);
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    /// Recursively remove a task directory. Missing tasks are a no-op.
    pub fn delete(&self, task_id: &TaskId) -> Result<(), StoreError> {
        let guard = self.lock_for(task_id.as_str());
        let _held = guard.lock();

        let dir = self.task_dir(task_id.as_str());
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        self.locks.lock().remove(task_id.as_str());
        Ok(())
    }
}

#[cfg(test)]
#[path = "task_store_tests.rs"]
mod tests;
