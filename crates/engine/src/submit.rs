// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Submission frontend: validate, dedup, enqueue, record.

use crate::error::EngineError;
use crate::results::SchemaProfile;
use scanq_core::{
    request_fingerprint, Clock, ScanPayload, ScanType, TaskId, TaskRecord, TaskStatus, TraceId,
};
use scanq_queue::{ClaimOutcome, IdempotencyIndex, QueueEntry, TaskQueue};
use scanq_scanner::ScannerRegistry;
use scanq_store::TaskStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Average scan duration estimate used for queue-wait projection.
const ESTIMATED_MINUTES_PER_SCAN: u64 = 15;

/// One scan-submission call.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub scan_type: ScanType,
    pub payload: ScanPayload,
    pub scanner_pool: Option<String>,
    pub scanner_instance: Option<String>,
    pub idempotency_key: Option<String>,
}

/// Synchronous response to a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub task_id: TaskId,
    pub trace_id: TraceId,
    pub status: TaskStatus,
    pub scanner_pool: String,
    pub scanner_instance: String,
    pub queue_position: u64,
    pub estimated_wait_minutes: u64,
    /// True when an idempotency hit returned an existing task.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deduplicated: bool,
}

/// Receipt for an idempotency hit, built from the stored task. Never
/// touches the registry: a replay must answer even while the pool is
/// down for maintenance.
async fn dedup_receipt<Q: TaskQueue>(
    store: &TaskStore,
    queue: &Q,
    request: &SubmitRequest,
    existing: TaskId,
) -> Result<SubmitReceipt, EngineError> {
    let (status, trace_id, pool, instance) = match store.get(&existing) {
        Ok(record) => (
            record.status,
            record.trace_id,
            record.scanner_pool,
            record.scanner_instance_id,
        ),
        // Entry outlived its record (housekeeping or a lost create); echo
        // the request's view of the world.
        Err(_) => (
            TaskStatus::Queued,
            TraceId::generate(),
            request.scanner_pool.clone().unwrap_or_default(),
            request.scanner_instance.clone().unwrap_or_default(),
        ),
    };
    let queue_position = queue.depth(&pool).await?;
    Ok(SubmitReceipt {
        task_id: existing,
        trace_id,
        status,
        scanner_pool: pool,
        scanner_instance: instance,
        queue_position,
        estimated_wait_minutes: queue_position * ESTIMATED_MINUTES_PER_SCAN,
        deduplicated: true,
    })
}

/// Accept a scan submission: validate, apply idempotency, resolve the pool
/// and candidate instance, create the QUEUED record, enqueue.
pub async fn submit<Q, I, C>(
    store: &TaskStore,
    queue: &Q,
    idempotency: &I,
    registry: &Arc<ScannerRegistry>,
    clock: &C,
    request: SubmitRequest,
) -> Result<SubmitReceipt, EngineError>
where
    Q: TaskQueue,
    I: IdempotencyIndex,
    C: Clock,
{
    request.payload.validate(request.scan_type)?;
    if let Some(profile) = &request.payload.schema_profile {
        SchemaProfile::parse(profile)?;
    }

    let fingerprint = request_fingerprint(
        request.scan_type,
        &request.payload,
        request.scanner_pool.as_deref(),
        request.scanner_instance.as_deref(),
    );

    // Idempotency runs ahead of pool and capacity resolution, so a replay
    // early-returns the stored task before anything else can fail.
    if let Some(key) = &request.idempotency_key {
        match idempotency.lookup(key).await? {
            Some((existing, stored)) if stored == fingerprint => {
                info!(task_id = %existing, key, "idempotent replay, returning existing task");
                return dedup_receipt(store, queue, &request, existing).await;
            }
            Some((existing, _)) => return Err(EngineError::Conflict { existing }),
            None => {}
        }
    }

    let pool = match &request.scanner_pool {
        Some(pool) => {
            if !registry.has_pool(pool) {
                return Err(EngineError::Validation(format!(
                    "unknown scanner pool: {pool}"
                )));
            }
            pool.clone()
        }
        None => registry.default_pool()?,
    };

    // Candidate instance for the record and the task ID; the worker acquires
    // for real at dispatch time.
    let candidate = match &request.scanner_instance {
        Some(instance) => {
            let known = registry
                .instances(&pool)?
                .into_iter()
                .find(|i| &i.instance_id == instance);
            match known {
                Some(_) => instance.clone(),
                None => {
                    return Err(EngineError::Validation(format!(
                        "unknown scanner instance {instance} in pool {pool}"
                    )))
                }
            }
        }
        None => registry.candidate(&pool)?.instance_id,
    };

    let now = clock.now_utc();
    let kind = scanq_scanner::ScannerKind::from_pool(&pool).ok_or_else(|| {
        EngineError::Validation(format!("pool {pool} has no scanner driver"))
    })?;
    let task_id = TaskId::compose(kind.id_prefix(), &candidate, now);
    let trace_id = TraceId::generate();

    // Set-if-absent closes the race between the lookup above and a
    // concurrent submission with the same key.
    if let Some(key) = &request.idempotency_key {
        match idempotency.claim(key, &task_id, &fingerprint).await? {
            ClaimOutcome::Stored => {}
            ClaimOutcome::Existing(existing) => {
                info!(task_id = %existing, key, "idempotent replay, returning existing task");
                return dedup_receipt(store, queue, &request, existing).await;
            }
            ClaimOutcome::Conflict(existing) => {
                return Err(EngineError::Conflict { existing });
            }
        }
    }

    let mut record = TaskRecord::new(
        task_id.clone(),
        trace_id.clone(),
        request.scan_type,
        pool.clone(),
        candidate.clone(),
        request.payload,
        now,
    );
    record.scanner_instance_pinned = request.scanner_instance.is_some();
    store.create(&record)?;

    queue
        .enqueue(&pool, QueueEntry::new(task_id.clone(), &pool, clock.epoch_ms()))
        .await?;
    let queue_position = queue.depth(&pool).await?;

    info!(
        task_id = %task_id,
        trace_id = %trace_id,
        pool,
        scan_type = %request.scan_type,
        queue_position,
        "scan submitted"
    );

    Ok(SubmitReceipt {
        task_id,
        trace_id,
        status: TaskStatus::Queued,
        scanner_pool: pool,
        scanner_instance: candidate,
        queue_position,
        estimated_wait_minutes: queue_position * ESTIMATED_MINUTES_PER_SCAN,
        deduplicated: false,
    })
}

#[cfg(test)]
#[path = "submit_tests.rs"]
mod tests;
