// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory queue and idempotency index for tests.
#![cfg_attr(coverage_nightly, coverage(off))]

use crate::entry::{DeadLetterEntry, QueueEntry};
use crate::{ClaimOutcome, IdempotencyIndex, QueueError, TaskQueue};
use async_trait::async_trait;
use parking_lot::Mutex;
use scanq_core::TaskId;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Default)]
struct MemoryState {
    queues: HashMap<String, VecDeque<QueueEntry>>,
    dlq: HashMap<String, Vec<DeadLetterEntry>>,
    idempotency: HashMap<String, (TaskId, String)>,
}

/// Drop-in replacement for the Redis queue with identical semantics.
#[derive(Clone, Default)]
pub struct MemoryQueue {
    state: Arc<Mutex<MemoryState>>,
    notify: Arc<Notify>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn try_pop(&self, pools: &[String]) -> Option<QueueEntry> {
        let mut state = self.state.lock();
        for pool in pools {
            if let Some(queue) = state.queues.get_mut(pool) {
                if let Some(entry) = queue.pop_front() {
                    return Some(entry);
                }
            }
        }
        None
    }
}

#[async_trait]
impl TaskQueue for MemoryQueue {
    async fn enqueue(&self, pool: &str, entry: QueueEntry) -> Result<(), QueueError> {
        self.state
            .lock()
            .queues
            .entry(pool.to_string())
            .or_default()
            .push_back(entry);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn dequeue_any(
        &self,
        pools: &[String],
        timeout: Duration,
    ) -> Result<Option<QueueEntry>, QueueError> {
        let deadline = Instant::now() + timeout;
        loop {
            // Register for wakeups before checking, so a concurrent enqueue
            // between the check and the await is not missed.
            let notified = self.notify.notified();
            if let Some(entry) = self.try_pop(pools) {
                return Ok(Some(entry));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep(remaining) => return Ok(None),
            }
        }
    }

    async fn depth(&self, pool: &str) -> Result<u64, QueueError> {
        Ok(self
            .state
            .lock()
            .queues
            .get(pool)
            .map(|q| q.len() as u64)
            .unwrap_or(0))
    }

    async fn move_to_dlq(
        &self,
        pool: &str,
        entry: &QueueEntry,
        error: &str,
        failure_at_ms: u64,
    ) -> Result<(), QueueError> {
        let mut state = self.state.lock();
        if let Some(queue) = state.queues.get_mut(pool) {
            queue.retain(|queued| queued != entry);
        }
        let dead = DeadLetterEntry::from_entry(entry, error, failure_at_ms);
        let dlq = state.dlq.entry(pool.to_string()).or_default();
        dlq.push(dead);
        dlq.sort_by(|a, b| b.failure_at_ms.cmp(&a.failure_at_ms));
        Ok(())
    }

    async fn peek_dlq(&self, pool: &str, limit: usize) -> Result<Vec<DeadLetterEntry>, QueueError> {
        Ok(self
            .state
            .lock()
            .dlq
            .get(pool)
            .map(|entries| entries.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn remove_from_dlq(&self, pool: &str, task_id: &TaskId) -> Result<bool, QueueError> {
        let mut state = self.state.lock();
        let Some(entries) = state.dlq.get_mut(pool) else {
            return Ok(false);
        };
        let before = entries.len();
        entries.retain(|e| &e.task_id != task_id);
        Ok(entries.len() < before)
    }

    async fn clear_dlq(&self, pool: &str, before_ms: Option<u64>) -> Result<u64, QueueError> {
        let mut state = self.state.lock();
        let Some(entries) = state.dlq.get_mut(pool) else {
            return Ok(0);
        };
        let before = entries.len();
        match before_ms {
            Some(cutoff) => entries.retain(|e| e.failure_at_ms >= cutoff),
            None => entries.clear(),
        }
        Ok((before - entries.len()) as u64)
    }

    async fn dlq_depth(&self, pool: &str) -> Result<u64, QueueError> {
        Ok(self
            .state
            .lock()
            .dlq
            .get(pool)
            .map(|entries| entries.len() as u64)
            .unwrap_or(0))
    }
}

#[async_trait]
impl IdempotencyIndex for MemoryQueue {
    async fn lookup(&self, key: &str) -> Result<Option<(TaskId, String)>, QueueError> {
        Ok(self
            .state
            .lock()
            .idempotency
            .get(key)
            .map(|(task_id, fingerprint)| (task_id.clone(), fingerprint.clone())))
    }

    async fn claim(
        &self,
        key: &str,
        task_id: &TaskId,
        fingerprint: &str,
    ) -> Result<ClaimOutcome, QueueError> {
        let mut state = self.state.lock();
        match state.idempotency.get(key) {
            Some((existing_task, existing_fp)) => {
                if existing_fp == fingerprint {
                    Ok(ClaimOutcome::Existing(existing_task.clone()))
                } else {
                    Ok(ClaimOutcome::Conflict(existing_task.clone()))
                }
            }
            None => {
                state
                    .idempotency
                    .insert(key.to_string(), (task_id.clone(), fingerprint.to_string()));
                Ok(ClaimOutcome::Stored)
            }
        }
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
