// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status, results, and listing handlers.

use super::AppContext;
use crate::protocol::Response;
use scanq_core::{Clock, TaskId};
use scanq_engine::{get_scan_status, list_tasks, render_results, ListQuery, ResultsQuery};
use std::collections::BTreeMap;

pub(super) fn get_status<Q>(ctx: &AppContext<Q>, task_id: &str) -> Response {
    match get_scan_status(&ctx.store, &TaskId::new(task_id), ctx.clock.now_utc()) {
        Ok(view) => Response::ScanStatus(view),
        Err(e) => Response::from_engine_error(&e),
    }
}

pub(super) fn get_results<Q>(
    ctx: &AppContext<Q>,
    task_id: &str,
    page: u32,
    page_size: u32,
    schema_profile: Option<String>,
    custom_fields: Option<Vec<String>>,
    filters: BTreeMap<String, String>,
) -> Response {
    let task_id = TaskId::new(task_id);
    let record = match ctx.store.get(&task_id) {
        Ok(record) => record,
        Err(e) => return Response::from_engine_error(&e.into()),
    };
    let artifact = match ctx.store.read_artifact(&task_id) {
        Ok(artifact) => artifact,
        Err(e) => return Response::from_engine_error(&e.into()),
    };
    let query = ResultsQuery {
        page,
        page_size,
        schema_profile,
        custom_fields,
        filters,
    };
    match render_results(&record, &artifact, &query) {
        Ok(content) => Response::ScanResults {
            task_id: task_id.to_string(),
            content,
        },
        Err(e) => Response::from_engine_error(&e),
    }
}

pub(super) fn list<Q>(
    ctx: &AppContext<Q>,
    limit: Option<usize>,
    status_filter: Option<String>,
    scanner_pool: Option<String>,
    target_filter: Option<String>,
) -> Response {
    let query = ListQuery {
        status: status_filter,
        scanner_pool,
        target_filter,
        limit,
    };
    match list_tasks(&ctx.store, &query) {
        Ok(tasks) => Response::Tasks {
            count: tasks.len(),
            tasks,
        },
        Err(e) => Response::from_engine_error(&e),
    }
}
