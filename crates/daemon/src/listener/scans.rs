// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scan submission handlers.

use super::AppContext;
use crate::protocol::Response;
use scanq_core::{
    CredentialKind, Credentials, Escalation, EscalationMethod, ScanPayload, ScanType,
};
use scanq_engine::{submit, SubmitRequest};
use scanq_queue::{IdempotencyIndex, TaskQueue};

#[allow(clippy::too_many_arguments)]
pub(super) async fn run_untrusted<Q>(
    ctx: &AppContext<Q>,
    targets: String,
    name: String,
    description: Option<String>,
    schema_profile: Option<String>,
    scanner_pool: Option<String>,
    scanner_instance: Option<String>,
    idempotency_key: Option<String>,
) -> Response
where
    Q: TaskQueue + IdempotencyIndex + Send + Sync,
{
    let payload = ScanPayload {
        targets,
        name,
        description,
        schema_profile,
        credentials: None,
    };
    submit_scan(
        ctx,
        SubmitRequest {
            scan_type: ScanType::Untrusted,
            payload,
            scanner_pool,
            scanner_instance,
            idempotency_key,
        },
    )
    .await
}

/// Arguments of `run_authenticated_scan`, bundled to keep the handler
/// signature sane.
pub(super) struct AuthenticatedArgs {
    pub targets: String,
    pub name: String,
    pub scan_type: String,
    pub ssh_username: String,
    pub ssh_password: String,
    pub elevate_privileges_with: Option<String>,
    pub escalation_account: Option<String>,
    pub escalation_password: Option<String>,
    pub description: Option<String>,
    pub schema_profile: Option<String>,
    pub scanner_pool: Option<String>,
    pub scanner_instance: Option<String>,
    pub idempotency_key: Option<String>,
}

pub(super) async fn run_authenticated<Q>(ctx: &AppContext<Q>, args: AuthenticatedArgs) -> Response
where
    Q: TaskQueue + IdempotencyIndex + Send + Sync,
{
    let scan_type = match args.scan_type.as_str() {
        "authenticated" => ScanType::Authenticated,
        "authenticated_privileged" => ScanType::AuthenticatedPrivileged,
        other => {
            return validation_error(format!(
                "scan_type must be authenticated or authenticated_privileged, got {other}"
            ))
        }
    };

    let escalation = match args.elevate_privileges_with.as_deref() {
        Some(method) => match EscalationMethod::parse(method) {
            Ok(method) => Some(Escalation {
                method,
                account: args.escalation_account,
                secret: args.escalation_password,
            }),
            Err(e) => return validation_error(e.to_string()),
        },
        None => None,
    };

    let payload = ScanPayload {
        targets: args.targets,
        name: args.name,
        description: args.description,
        schema_profile: args.schema_profile,
        credentials: Some(Credentials {
            kind: CredentialKind::SshPassword,
            username: args.ssh_username,
            secret: args.ssh_password,
            escalation,
        }),
    };
    submit_scan(
        ctx,
        SubmitRequest {
            scan_type,
            payload,
            scanner_pool: args.scanner_pool,
            scanner_instance: args.scanner_instance,
            idempotency_key: args.idempotency_key,
        },
    )
    .await
}

async fn submit_scan<Q>(ctx: &AppContext<Q>, request: SubmitRequest) -> Response
where
    Q: TaskQueue + IdempotencyIndex + Send + Sync,
{
    match submit(
        &ctx.store,
        ctx.queue.as_ref(),
        ctx.queue.as_ref(),
        &ctx.registry,
        &ctx.clock,
        request,
    )
    .await
    {
        Ok(receipt) => Response::ScanQueued(receipt),
        Err(e) => Response::from_engine_error(&e),
    }
}

fn validation_error(message: String) -> Response {
    Response::Error {
        error: "validation_error".to_string(),
        message,
        status_code: Some(400),
    }
}
