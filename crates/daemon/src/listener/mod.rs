// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unix-socket listener for the tool-invocation surface.
//!
//! One task per connection; each connection carries a sequence of
//! length-prefixed request/response pairs.

mod pools;
mod query;
mod scans;

use crate::protocol::{Request, Response, PROTOCOL_VERSION};
use crate::protocol_wire::{read_message, write_message};
use scanq_core::{Clock, SystemClock};
use scanq_queue::{IdempotencyIndex, TaskQueue};
use scanq_scanner::ScannerRegistry;
use scanq_store::TaskStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Shared state handed to every request handler.
pub struct AppContext<Q> {
    pub store: Arc<TaskStore>,
    pub queue: Arc<Q>,
    pub registry: Arc<ScannerRegistry>,
    pub clock: SystemClock,
    /// Registry file for `reload_scanners`; `None` disables reload.
    pub scanners_file: Option<PathBuf>,
    pub started_at_ms: u64,
    pub shutdown: Arc<watch::Sender<bool>>,
}

/// Dispatch one request to its handler.
pub async fn handle_request<Q>(ctx: &AppContext<Q>, request: Request) -> Response
where
    Q: TaskQueue + IdempotencyIndex + Send + Sync,
{
    match request {
        Request::Ping => Response::Pong {
            version: PROTOCOL_VERSION.to_string(),
            uptime_secs: ctx.clock.epoch_ms().saturating_sub(ctx.started_at_ms) / 1000,
        },
        Request::RunUntrustedScan {
            targets,
            name,
            description,
            schema_profile,
            scanner_pool,
            scanner_instance,
            idempotency_key,
        } => {
            scans::run_untrusted(
                ctx,
                targets,
                name,
                description,
                schema_profile,
                scanner_pool,
                scanner_instance,
                idempotency_key,
            )
            .await
        }
        Request::RunAuthenticatedScan {
            targets,
            name,
            scan_type,
            ssh_username,
            ssh_password,
            elevate_privileges_with,
            escalation_account,
            escalation_password,
            description,
            schema_profile,
            scanner_pool,
            scanner_instance,
            idempotency_key,
        } => {
            scans::run_authenticated(
                ctx,
                scans::AuthenticatedArgs {
                    targets,
                    name,
                    scan_type,
                    ssh_username,
                    ssh_password,
                    elevate_privileges_with,
                    escalation_account,
                    escalation_password,
                    description,
                    schema_profile,
                    scanner_pool,
                    scanner_instance,
                    idempotency_key,
                },
            )
            .await
        }
        Request::GetScanStatus { task_id } => query::get_status(ctx, &task_id),
        Request::GetScanResults {
            task_id,
            page,
            page_size,
            schema_profile,
            custom_fields,
            filters,
        } => query::get_results(ctx, &task_id, page, page_size, schema_profile, custom_fields, filters),
        Request::ListTasks {
            limit,
            status_filter,
            scanner_pool,
            target_filter,
        } => query::list(ctx, limit, status_filter, scanner_pool, target_filter),
        Request::ListScanners { scanner_pool } => pools::list_scanners(ctx, scanner_pool),
        Request::ListPools => pools::list_pools(ctx),
        Request::GetPoolStatus { scanner_pool } => pools::pool_status(ctx, scanner_pool),
        Request::GetQueueStatus { scanner_pool } => pools::queue_status(ctx, scanner_pool).await,
        Request::GetDlqStatus {
            scanner_pool,
            limit,
        } => pools::dlq_status(ctx, scanner_pool, limit).await,
        Request::RemoveFromDlq {
            scanner_pool,
            task_id,
        } => pools::remove_from_dlq(ctx, &scanner_pool, &task_id).await,
        Request::ClearDlq {
            scanner_pool,
            before_ms,
        } => pools::clear_dlq(ctx, &scanner_pool, before_ms).await,
        Request::ReloadScanners => pools::reload_scanners(ctx),
        Request::Shutdown => {
            info!("shutdown requested over IPC");
            let _ = ctx.shutdown.send(true);
            Response::ShuttingDown
        }
    }
}

async fn handle_connection<Q>(stream: UnixStream, ctx: Arc<AppContext<Q>>)
where
    Q: TaskQueue + IdempotencyIndex + Send + Sync,
{
    let (mut reader, mut writer) = stream.into_split();
    loop {
        match read_message::<Request, _>(&mut reader).await {
            Ok(Some(request)) => {
                debug!(tool = request.kind(), "request received");
                let response = handle_request(&ctx, request).await;
                if let Err(e) = write_message(&mut writer, &response).await {
                    warn!(error = %e, "response write failed, dropping connection");
                    return;
                }
            }
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "bad request on connection");
                let response = Response::Error {
                    error: "protocol_error".to_string(),
                    message: e.to_string(),
                    status_code: Some(400),
                };
                let _ = write_message(&mut writer, &response).await;
                return;
            }
        }
    }
}

/// Accept connections until shutdown. Removes a stale socket file on bind
/// and cleans up on exit.
pub async fn serve<Q>(
    socket_path: PathBuf,
    ctx: Arc<AppContext<Q>>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), std::io::Error>
where
    Q: TaskQueue + IdempotencyIndex + Send + Sync + 'static,
{
    let _ = std::fs::remove_file(&socket_path);
    let listener = UnixListener::bind(&socket_path)?;
    info!(socket = %socket_path.display(), "listener ready");

    loop {
        tokio::select! {
            _ = shutdown.wait_for(|stop| *stop) => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _addr)) => {
                    tokio::spawn(handle_connection(stream, ctx.clone()));
                }
                Err(e) => warn!(error = %e, "accept failed"),
            },
        }
    }

    let _ = std::fs::remove_file(&socket_path);
    Ok(())
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
