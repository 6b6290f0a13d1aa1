// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scanner, pool, queue, and dead-letter handlers.

use super::AppContext;
use crate::protocol::{DlqStatusEntry, QueueStatusEntry, Response};
use scanq_core::TaskId;
use scanq_queue::TaskQueue;
use scanq_scanner::load_pool_map;
use tracing::warn;

const DEFAULT_DLQ_PEEK: usize = 20;

fn registry_error(e: scanq_scanner::RegistryError) -> Response {
    Response::from_engine_error(&scanq_engine::EngineError::Registry(e))
}

/// Resolve an optional pool argument to a concrete pool list.
fn resolve_pools<Q>(ctx: &AppContext<Q>, scanner_pool: Option<String>) -> Result<Vec<String>, Response> {
    match scanner_pool {
        Some(pool) => {
            if !ctx.registry.has_pool(&pool) {
                return Err(registry_error(scanq_scanner::RegistryError::UnknownPool(
                    pool,
                )));
            }
            Ok(vec![pool])
        }
        None => Ok(ctx.registry.list_pools()),
    }
}

pub(super) fn list_scanners<Q>(ctx: &AppContext<Q>, scanner_pool: Option<String>) -> Response {
    let pools = match resolve_pools(ctx, scanner_pool) {
        Ok(pools) => pools,
        Err(response) => return response,
    };
    let mut scanners = Vec::new();
    for pool in pools {
        match ctx.registry.instances(&pool) {
            Ok(instances) => scanners.extend(instances),
            Err(e) => return registry_error(e),
        }
    }
    Response::Scanners { scanners }
}

pub(super) fn list_pools<Q>(ctx: &AppContext<Q>) -> Response {
    match ctx.registry.default_pool() {
        Ok(default_pool) => Response::Pools {
            pools: ctx.registry.list_pools(),
            default_pool,
        },
        Err(e) => registry_error(e),
    }
}

pub(super) fn pool_status<Q>(ctx: &AppContext<Q>, scanner_pool: Option<String>) -> Response {
    match scanner_pool {
        Some(pool) => match ctx.registry.pool_status(&pool) {
            Ok(status) => Response::PoolStatus {
                pools: vec![status],
            },
            Err(e) => registry_error(e),
        },
        None => Response::PoolStatus {
            pools: ctx.registry.all_pool_status(),
        },
    }
}

pub(super) async fn queue_status<Q>(ctx: &AppContext<Q>, scanner_pool: Option<String>) -> Response
where
    Q: TaskQueue + Send + Sync,
{
    let pools = match resolve_pools(ctx, scanner_pool) {
        Ok(pools) => pools,
        Err(response) => return response,
    };
    let mut queues = Vec::with_capacity(pools.len());
    for pool in pools {
        let queue_depth = match ctx.queue.depth(&pool).await {
            Ok(depth) => depth,
            Err(e) => return Response::from_engine_error(&e.into()),
        };
        let dlq_depth = match ctx.queue.dlq_depth(&pool).await {
            Ok(depth) => depth,
            Err(e) => return Response::from_engine_error(&e.into()),
        };
        queues.push(QueueStatusEntry {
            pool,
            queue_depth,
            dlq_depth,
        });
    }
    Response::QueueStatus { queues }
}

pub(super) async fn dlq_status<Q>(
    ctx: &AppContext<Q>,
    scanner_pool: Option<String>,
    limit: Option<usize>,
) -> Response
where
    Q: TaskQueue + Send + Sync,
{
    let pools = match resolve_pools(ctx, scanner_pool) {
        Ok(pools) => pools,
        Err(response) => return response,
    };
    let limit = limit.unwrap_or(DEFAULT_DLQ_PEEK);
    let mut entries = Vec::with_capacity(pools.len());
    for pool in pools {
        match ctx.queue.peek_dlq(&pool, limit).await {
            Ok(dead) => entries.push(DlqStatusEntry {
                pool,
                entries: dead,
            }),
            Err(e) => return Response::from_engine_error(&e.into()),
        }
    }
    Response::DlqStatus { pools: entries }
}

pub(super) async fn remove_from_dlq<Q>(ctx: &AppContext<Q>, pool: &str, task_id: &str) -> Response
where
    Q: TaskQueue + Send + Sync,
{
    match ctx
        .queue
        .remove_from_dlq(pool, &TaskId::new(task_id))
        .await
    {
        Ok(removed) => Response::DlqRemoved { removed },
        Err(e) => Response::from_engine_error(&e.into()),
    }
}

pub(super) async fn clear_dlq<Q>(ctx: &AppContext<Q>, pool: &str, before_ms: Option<u64>) -> Response
where
    Q: TaskQueue + Send + Sync,
{
    match ctx.queue.clear_dlq(pool, before_ms).await {
        Ok(cleared) => Response::DlqCleared { cleared },
        Err(e) => Response::from_engine_error(&e.into()),
    }
}

/// Re-read the registry file and swap the instance set. In-flight counts
/// carry over for surviving instances.
pub(super) fn reload_scanners<Q>(ctx: &AppContext<Q>) -> Response {
    let Some(path) = &ctx.scanners_file else {
        return Response::Error {
            error: "validation_error".to_string(),
            message: "no scanner registry file configured".to_string(),
            status_code: Some(400),
        };
    };
    match load_pool_map(path) {
        Ok(pool_map) => {
            ctx.registry.reload(pool_map);
            Response::ScannersReloaded {
                pools: ctx.registry.list_pools(),
            }
        }
        Err(e) => {
            warn!(error = %e, path = %path.display(), "registry reload failed");
            Response::Error {
                error: "config_error".to_string(),
                message: e.to_string(),
                status_code: None,
            }
        }
    }
}
