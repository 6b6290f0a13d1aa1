// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared builders for other crates' tests (feature `test-support`).

use crate::id::{TaskId, TraceId};
use crate::payload::{CredentialKind, Credentials, Escalation, EscalationMethod, ScanPayload};
use crate::task::{ScanType, TaskRecord};
use chrono::{DateTime, TimeZone, Utc};

/// Fixed creation time used by record builders: 2026-03-01T00:00:00Z.
pub fn fixed_created_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Untrusted payload against a /24.
pub fn untrusted_payload() -> ScanPayload {
    ScanPayload {
        targets: "192.168.1.0/24".to_string(),
        name: "spec-scan".to_string(),
        description: None,
        schema_profile: None,
        credentials: None,
    }
}

/// SSH-password payload, optionally with sudo escalation.
pub fn ssh_payload(escalated: bool) -> ScanPayload {
    let escalation = escalated.then(|| Escalation {
        method: EscalationMethod::Sudo,
        account: None,
        secret: Some("esc-secret".to_string()),
    });
    ScanPayload {
        targets: "10.20.0.5".to_string(),
        name: "cred-scan".to_string(),
        description: None,
        schema_profile: None,
        credentials: Some(Credentials {
            kind: CredentialKind::SshPassword,
            username: "svc-scan".to_string(),
            secret: "pw".to_string(),
            escalation,
        }),
    }
}

/// A fresh QUEUED record for the given payload.
pub fn queued_record(task_id: &str, scan_type: ScanType, payload: ScanPayload) -> TaskRecord {
    TaskRecord::new(
        TaskId::new(task_id),
        TraceId::new(format!("trace-{task_id}")),
        scan_type,
        "nessus",
        "scanner-01",
        payload,
        fixed_created_at(),
    )
}
