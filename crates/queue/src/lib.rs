// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! scanq-queue: pool-scoped FIFO work queues, dead-letter sets, and the
//! idempotency index, on a shared key/value service.
//!
//! The production implementation rides Redis primitives — list push/pop for
//! the queues (blocking pop, never busy-polling), a sorted set per pool for
//! dead letters, set-if-absent with TTL for idempotency claims. An
//! in-memory twin with identical semantics backs tests (feature
//! `test-support`).

mod entry;
#[cfg(any(test, feature = "test-support"))]
mod memory;
mod redis_kv;

pub use entry::{DeadLetterEntry, QueueEntry};
#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryQueue;
pub use redis_kv::RedisQueue;

use async_trait::async_trait;
use scanq_core::TaskId;
use std::time::Duration;
use thiserror::Error;

/// Idempotency entries live for 48 hours.
pub const IDEMPOTENCY_TTL_SECS: u64 = 48 * 3600;

/// Errors from queue and idempotency operations.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("key/value service error: {0}")]
    Backend(#[from] redis::RedisError),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Pool-scoped FIFO work distribution with dead-letter handling.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Append to the tail of the pool's queue. Never rejects.
    async fn enqueue(&self, pool: &str, entry: QueueEntry) -> Result<(), QueueError>;

    /// Block up to `timeout` for the head of the first non-empty queue in
    /// `pools` argument order. `None` on timeout.
    async fn dequeue_any(
        &self,
        pools: &[String],
        timeout: Duration,
    ) -> Result<Option<QueueEntry>, QueueError>;

    async fn depth(&self, pool: &str) -> Result<u64, QueueError>;

    /// Move an entry to the pool's dead-letter set, recording the failure.
    /// If the entry is still queued it is removed in the same operation.
    async fn move_to_dlq(
        &self,
        pool: &str,
        entry: &QueueEntry,
        error: &str,
        failure_at_ms: u64,
    ) -> Result<(), QueueError>;

    /// Most-recent-first page of dead letters.
    async fn peek_dlq(&self, pool: &str, limit: usize) -> Result<Vec<DeadLetterEntry>, QueueError>;

    /// Returns whether an entry was removed.
    async fn remove_from_dlq(&self, pool: &str, task_id: &TaskId) -> Result<bool, QueueError>;

    /// Drop dead letters, optionally only those failed before `before_ms`.
    /// Returns the number removed.
    async fn clear_dlq(&self, pool: &str, before_ms: Option<u64>) -> Result<u64, QueueError>;

    async fn dlq_depth(&self, pool: &str) -> Result<u64, QueueError>;
}

/// Result of an idempotency claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Key was free; this submission owns it now.
    Stored,
    /// Key exists with a matching fingerprint; reuse the stored task.
    Existing(TaskId),
    /// Key exists with a different fingerprint.
    Conflict(TaskId),
}

/// Short-TTL mapping of client idempotency keys to task IDs.
#[async_trait]
pub trait IdempotencyIndex: Send + Sync {
    /// Read the live claim for `key`, if any: `(task_id, fingerprint)`.
    async fn lookup(&self, key: &str) -> Result<Option<(TaskId, String)>, QueueError>;

    /// Atomically claim `key` for `task_id` (set-if-absent with TTL), or
    /// report the existing claim.
    async fn claim(
        &self,
        key: &str,
        task_id: &TaskId,
        fingerprint: &str,
    ) -> Result<ClaimOutcome, QueueError>;
}
