// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue and dead-letter entry types.

use scanq_core::TaskId;
use serde::{Deserialize, Serialize};

/// One unit of queued work. The payload itself lives in the task store;
/// the queue only routes task IDs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub task_id: TaskId,
    pub scanner_pool: String,
    pub enqueued_at_ms: u64,
}

impl QueueEntry {
    pub fn new(task_id: TaskId, scanner_pool: impl Into<String>, enqueued_at_ms: u64) -> Self {
        Self {
            task_id,
            scanner_pool: scanner_pool.into(),
            enqueued_at_ms,
        }
    }
}

/// A permanently failed entry awaiting operator action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub task_id: TaskId,
    pub scanner_pool: String,
    pub enqueued_at_ms: u64,
    pub error_message: String,
    pub failure_at_ms: u64,
}

impl DeadLetterEntry {
    pub fn from_entry(entry: &QueueEntry, error: &str, failure_at_ms: u64) -> Self {
        Self {
            task_id: entry.task_id.clone(),
            scanner_pool: entry.scanner_pool.clone(),
            enqueued_at_ms: entry.enqueued_at_ms,
            error_message: error.to_string(),
            failure_at_ms,
        }
    }
}

#[cfg(test)]
#[path = "entry_tests.rs"]
mod tests;
