// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn severity_counts_record_by_level() {
    let mut counts = SeverityCounts::default();
    for level in [4, 4, 3, 2, 1, 0, 0] {
        counts.record(level);
    }
    assert_eq!(counts.critical, 2);
    assert_eq!(counts.high, 1);
    assert_eq!(counts.medium, 1);
    assert_eq!(counts.low, 1);
    assert_eq!(counts.info, 2);
    assert_eq!(counts.total(), 7);
}

#[test]
fn unknown_levels_count_as_info() {
    let mut counts = SeverityCounts::default();
    counts.record(9);
    assert_eq!(counts.info, 1);
}

#[test]
fn invalid_report_is_not_applicable() {
    let report = ValidationReport::invalid("empty artifact", 12);
    assert!(!report.is_valid);
    assert_eq!(report.error.as_deref(), Some("empty artifact"));
    assert_eq!(
        report.authentication_status,
        AuthenticationStatus::NotApplicable
    );
    assert_eq!(report.stats.artifact_bytes, 12);
    assert_eq!(report.stats.hosts, 0);
}

#[test]
fn results_summary_totals_severities() {
    let mut stats = ValidationStats::default();
    stats.hosts = 3;
    stats.artifact_bytes = 4096;
    stats.severity.record(4);
    stats.severity.record(2);
    let report = ValidationReport {
        is_valid: true,
        error: None,
        warnings: Vec::new(),
        stats,
        authentication_status: AuthenticationStatus::Success,
    };
    let summary = report.results_summary();
    assert_eq!(summary.host_count, 3);
    assert_eq!(summary.total_findings, 2);
    assert_eq!(summary.severity.critical, 1);
    assert_eq!(summary.artifact_bytes, 4096);
}

#[test]
fn authentication_status_serializes_snake_case() {
    assert_eq!(
        serde_json::to_string(&AuthenticationStatus::NotApplicable).unwrap(),
        r#""not_applicable""#
    );
    assert_eq!(AuthenticationStatus::Partial.to_string(), "partial");
}
