// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{export, host, item, local_check_items, untrusted_export};
use scanq_core::{AuthenticationStatus, ScanType};

#[test]
fn undersized_artifact_is_invalid() {
    let report = validate_artifact(ScanType::Untrusted, b"<NessusClientData_v2/>");
    assert!(!report.is_valid);
    assert!(report.error.as_deref().unwrap_or_default().contains("minimum"));
    assert_eq!(
        report.authentication_status,
        AuthenticationStatus::NotApplicable
    );
}

#[test]
fn unparseable_artifact_is_invalid() {
    let garbage = vec![b'x'; MIN_ARTIFACT_BYTES + 10];
    let report = validate_artifact(ScanType::Untrusted, &garbage);
    assert!(!report.is_valid);
    assert!(report.error.as_deref().unwrap_or_default().contains("parse"));
}

#[test]
fn zero_hosts_is_invalid() {
    let padding = " ".repeat(MIN_ARTIFACT_BYTES);
    let bytes = export(&padding);
    let report = validate_artifact(ScanType::Untrusted, &bytes);
    assert!(!report.is_valid);
    assert!(report.error.as_deref().unwrap_or_default().contains("hosts"));
}

#[test]
fn untrusted_scan_is_not_applicable() {
    let report = validate_artifact(ScanType::Untrusted, &untrusted_export());
    assert!(report.is_valid);
    assert_eq!(
        report.authentication_status,
        AuthenticationStatus::NotApplicable
    );
    assert_eq!(report.stats.hosts, 2);
    assert_eq!(report.stats.severity.critical, 1);
    assert_eq!(report.stats.severity.high, 2);
    assert_eq!(report.stats.severity.medium, 1);
    assert_eq!(report.stats.severity.info, 1);
}

#[test]
fn credential_markers_dictate_success() {
    let bytes = export(&format!(
        "{}{}",
        host("10.0.0.1", Some(true), &item(1, "a", "General", 1)),
        host("10.0.0.2", Some(true), &item(2, "b", "General", 1)),
    ));
    let report = validate_artifact(ScanType::Authenticated, &bytes);
    assert_eq!(report.authentication_status, AuthenticationStatus::Success);
}

#[test]
fn credential_markers_dictate_failure() {
    let bytes = export(&host("10.0.0.1", Some(false), &item(1, "a", "General", 1)));
    let report = validate_artifact(ScanType::Authenticated, &bytes);
    assert_eq!(report.authentication_status, AuthenticationStatus::Failed);
}

#[test]
fn mixed_markers_are_partial_with_warning() {
    let bytes = export(&format!(
        "{}{}",
        host("10.0.0.1", Some(true), &item(1, "a", "General", 1)),
        host("10.0.0.2", Some(false), &item(2, "b", "General", 1)),
    ));
    let report = validate_artifact(ScanType::Authenticated, &bytes);
    assert_eq!(report.authentication_status, AuthenticationStatus::Partial);
    assert!(report.warnings.iter().any(|w| w.contains("1 of 2")));
}

#[test]
fn failure_marker_plugin_beats_success_plugins() {
    let items = format!(
        "{}{}",
        item(141118, "Credential Status: Valid", "Settings", 0),
        item(21745, "Authentication Failure - Local Checks Not Run", "Settings", 0),
    );
    let bytes = export(&host("10.0.0.1", None, &items));
    let report = validate_artifact(ScanType::Authenticated, &bytes);
    assert_eq!(report.authentication_status, AuthenticationStatus::Failed);
}

#[yare::parameterized(
    none_is_failed      = { 0, AuthenticationStatus::Failed },
    one_is_partial      = { 1, AuthenticationStatus::Partial },
    four_is_partial     = { 4, AuthenticationStatus::Partial },
    five_is_success     = { 5, AuthenticationStatus::Success },
    many_is_success     = { 12, AuthenticationStatus::Success },
)]
fn inference_from_local_check_count(count: u64, expected: AuthenticationStatus) {
    let bytes = export(&host("10.0.0.1", None, &local_check_items(count)));
    let report = validate_artifact(ScanType::Authenticated, &bytes);
    assert_eq!(report.authentication_status, expected);
    assert_eq!(report.stats.auth_plugins_found, count);
    if expected == AuthenticationStatus::Partial {
        assert!(!report.warnings.is_empty());
    }
}

#[test]
fn insufficient_privilege_caps_privileged_at_partial() {
    let items = format!(
        "{}{}",
        local_check_items(8),
        item(110385, "Insufficient Privilege", "Settings", 0),
    );
    let bytes = export(&host("10.0.0.1", None, &items));

    let report = validate_artifact(ScanType::AuthenticatedPrivileged, &bytes);
    assert_eq!(report.authentication_status, AuthenticationStatus::Partial);
    assert!(report.warnings.iter().any(|w| w.contains("privilege")));

    // The same artifact for a plain authenticated scan stays a success.
    let report = validate_artifact(ScanType::Authenticated, &bytes);
    assert_eq!(report.authentication_status, AuthenticationStatus::Success);
}

#[test]
fn privileged_with_failed_markers_stays_failed() {
    let items = format!(
        "{}{}",
        item(104410, "Credential Failure", "Settings", 0),
        item(110385, "Insufficient Privilege", "Settings", 0),
    );
    let bytes = export(&host("10.0.0.1", None, &items));
    let report = validate_artifact(ScanType::AuthenticatedPrivileged, &bytes);
    assert_eq!(report.authentication_status, AuthenticationStatus::Failed);
}

#[test]
fn stats_feed_the_results_summary() {
    let report = validate_artifact(ScanType::Untrusted, &untrusted_export());
    let summary = report.results_summary();
    assert_eq!(summary.host_count, 2);
    assert_eq!(summary.total_findings, 5);
    assert!(summary.artifact_bytes > MIN_ARTIFACT_BYTES as u64);
}
