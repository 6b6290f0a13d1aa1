// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis implementation of the queue and idempotency contracts.
//!
//! Key layout:
//! - `scanq:queue:{pool}` — list, RPUSH tail / BLPOP head.
//! - `scanq:dlq:{pool}` — sorted set scored by failure timestamp (ms).
//! - `scanq:idem:{key}` — string JSON `{task_id, fingerprint}`, TTL 48h.

use crate::entry::{DeadLetterEntry, QueueEntry};
use crate::{ClaimOutcome, IdempotencyIndex, QueueError, TaskQueue, IDEMPOTENCY_TTL_SECS};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use scanq_core::TaskId;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

fn queue_key(pool: &str) -> String {
    format!("scanq:queue:{pool}")
}

fn dlq_key(pool: &str) -> String {
    format!("scanq:dlq:{pool}")
}

fn idem_key(key: &str) -> String {
    format!("scanq:idem:{key}")
}

#[derive(Serialize, Deserialize)]
struct IdemRecord {
    task_id: TaskId,
    fingerprint: String,
}

/// Queue + idempotency index on a shared Redis service.
///
/// The connection manager reconnects transparently; clones share it.
#[derive(Clone)]
pub struct RedisQueue {
    manager: ConnectionManager,
}

impl RedisQueue {
    pub async fn connect(url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(url)?;
        let manager = client.get_connection_manager().await?;
        Ok(Self { manager })
    }

    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

#[async_trait]
impl TaskQueue for RedisQueue {
    async fn enqueue(&self, pool: &str, entry: QueueEntry) -> Result<(), QueueError> {
        let raw = serde_json::to_string(&entry)?;
        let mut conn = self.conn();
        let _: i64 = conn.rpush(queue_key(pool), raw).await?;
        debug!(pool, task_id = %entry.task_id, "enqueued");
        Ok(())
    }

    async fn dequeue_any(
        &self,
        pools: &[String],
        timeout: Duration,
    ) -> Result<Option<QueueEntry>, QueueError> {
        if pools.is_empty() {
            return Ok(None);
        }
        let keys: Vec<String> = pools.iter().map(|p| queue_key(p)).collect();
        let mut conn = self.conn();
        // BLPOP checks keys in argument order and blocks server-side.
        let popped: Option<(String, String)> =
            conn.blpop(keys, timeout.as_secs_f64()).await?;
        match popped {
            Some((_key, raw)) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn depth(&self, pool: &str) -> Result<u64, QueueError> {
        let mut conn = self.conn();
        Ok(conn.llen(queue_key(pool)).await?)
    }

    async fn move_to_dlq(
        &self,
        pool: &str,
        entry: &QueueEntry,
        error: &str,
        failure_at_ms: u64,
    ) -> Result<(), QueueError> {
        let queued_raw = serde_json::to_string(entry)?;
        let dead = DeadLetterEntry::from_entry(entry, error, failure_at_ms);
        let dead_raw = serde_json::to_string(&dead)?;
        let mut conn = self.conn();
        // One transaction: drop the queued copy (if any) and record the
        // dead letter scored by failure time.
        redis::pipe()
            .atomic()
            .lrem(queue_key(pool), 1, queued_raw)
            .ignore()
            .zadd(dlq_key(pool), dead_raw, failure_at_ms as f64)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn peek_dlq(&self, pool: &str, limit: usize) -> Result<Vec<DeadLetterEntry>, QueueError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn();
        let raw: Vec<String> = conn
            .zrevrange(dlq_key(pool), 0, limit as isize - 1)
            .await?;
        let mut entries = Vec::with_capacity(raw.len());
        for member in raw {
            entries.push(serde_json::from_str(&member)?);
        }
        Ok(entries)
    }

    async fn remove_from_dlq(&self, pool: &str, task_id: &TaskId) -> Result<bool, QueueError> {
        let mut conn = self.conn();
        let members: Vec<String> = conn.zrange(dlq_key(pool), 0, -1).await?;
        for member in members {
            let entry: DeadLetterEntry = serde_json::from_str(&member)?;
            if &entry.task_id == task_id {
                let removed: i64 = conn.zrem(dlq_key(pool), member).await?;
                return Ok(removed > 0);
            }
        }
        Ok(false)
    }

    async fn clear_dlq(&self, pool: &str, before_ms: Option<u64>) -> Result<u64, QueueError> {
        let mut conn = self.conn();
        let removed: i64 = match before_ms {
            Some(before) => {
                conn.zrembyscore(dlq_key(pool), 0f64, before as f64 - 1.0)
                    .await?
            }
            None => {
                let count: i64 = conn.zcard(dlq_key(pool)).await?;
                let _: i64 = conn.del(dlq_key(pool)).await?;
                count
            }
        };
        Ok(removed.max(0) as u64)
    }

    async fn dlq_depth(&self, pool: &str) -> Result<u64, QueueError> {
        let mut conn = self.conn();
        Ok(conn.zcard(dlq_key(pool)).await?)
    }
}

#[async_trait]
impl IdempotencyIndex for RedisQueue {
    async fn lookup(&self, key: &str) -> Result<Option<(TaskId, String)>, QueueError> {
        let mut conn = self.conn();
        let raw: Option<String> = conn.get(idem_key(key)).await?;
        match raw {
            Some(raw) => {
                let record: IdemRecord = serde_json::from_str(&raw)?;
                Ok(Some((record.task_id, record.fingerprint)))
            }
            None => Ok(None),
        }
    }

    async fn claim(
        &self,
        key: &str,
        task_id: &TaskId,
        fingerprint: &str,
    ) -> Result<ClaimOutcome, QueueError> {
        let record = serde_json::to_string(&IdemRecord {
            task_id: task_id.clone(),
            fingerprint: fingerprint.to_string(),
        })?;
        let mut conn = self.conn();
        // Two rounds cover the claim expiring between SET NX and GET.
        for _ in 0..2 {
            let stored: Option<String> = redis::cmd("SET")
                .arg(idem_key(key))
                .arg(&record)
                .arg("NX")
                .arg("EX")
                .arg(IDEMPOTENCY_TTL_SECS)
                .query_async(&mut conn)
                .await?;
            if stored.is_some() {
                return Ok(ClaimOutcome::Stored);
            }
            let existing: Option<String> = conn.get(idem_key(key)).await?;
            if let Some(raw) = existing {
                let existing: IdemRecord = serde_json::from_str(&raw)?;
                return Ok(if existing.fingerprint == fingerprint {
                    ClaimOutcome::Existing(existing.task_id)
                } else {
                    ClaimOutcome::Conflict(existing.task_id)
                });
            }
        }
        let _: () = conn
            .set_ex(idem_key(key), record, IDEMPOTENCY_TTL_SECS)
            .await?;
        Ok(ClaimOutcome::Stored)
    }
}

#[cfg(test)]
#[path = "redis_kv_tests.rs"]
mod tests;
