// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    pending   = { "pending", MappedState::Queued },
    running   = { "running", MappedState::Running },
    paused    = { "paused", MappedState::Running },
    completed = { "completed", MappedState::Completed },
    canceled  = { "canceled", MappedState::Failed },
    cancelled = { "cancelled", MappedState::Failed },
    stopped   = { "stopped", MappedState::Failed },
    aborted   = { "aborted", MappedState::Failed },
)]
fn remote_state_mapping(raw: &str, expected: MappedState) {
    assert_eq!(map_remote_state(&RemoteScanState::parse(raw)), expected);
}

#[test]
fn unknown_states_keep_polling() {
    let state = RemoteScanState::parse("processing");
    assert_eq!(state, RemoteScanState::Other("processing".to_string()));
    assert_eq!(map_remote_state(&state), MappedState::Running);
}

#[yare::parameterized(
    transient_network = { DriverError::TransientNetwork("x".into()), true },
    remote_busy       = { DriverError::RemoteBusy("x".into()), true },
    auth_required     = { DriverError::AuthRequired("x".into()), false },
    not_found         = { DriverError::NotFound("x".into()), false },
    permanent         = { DriverError::Permanent("x".into()), false },
)]
fn transient_classification(error: DriverError, transient: bool) {
    assert_eq!(error.is_transient(), transient);
}

#[test]
fn scan_request_debug_redacts_credentials() {
    let request = ScanRequest {
        name: "s".to_string(),
        description: None,
        targets: vec!["10.0.0.1".to_string()],
        scan_type: scanq_core::ScanType::Authenticated,
        credentials: scanq_core::test_support::ssh_payload(false).credentials,
    };
    let rendered = format!("{request:?}");
    assert!(!rendered.contains("pw"));
    assert!(rendered.contains("<redacted>"));
}
