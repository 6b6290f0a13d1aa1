// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! scanq-store: persistent task records and scan artifacts.
//!
//! One directory per task under the data root, holding the metadata record
//! (`task.json`) and the native scanner export. The store is the single
//! writer of task state; all metadata writes are temp-file + rename atomic,
//! and state transitions are serialized per task.

mod recovery;
mod task_store;

pub use recovery::{recover_stale_running, sweep_abandoned_running, sweep_expired, RetentionPolicy};
pub use task_store::{StoreError, TaskFilter, TaskStore, ARTIFACT_FILE, RECORD_FILE};
