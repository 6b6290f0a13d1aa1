// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact validation and authentication-outcome classification.
//!
//! Classification is driven by what the export actually shows:
//! per-host credential-status markers dominate when present; otherwise the
//! count of finding types that only produce output after successful
//! authentication decides between success, partial, and failed.

use crate::report::{parse_report, HostReport, ScanReport};
use scanq_core::{AuthenticationStatus, ScanType, ValidationReport, ValidationStats};
use std::collections::HashSet;

/// Exports smaller than this cannot be a real scan result.
pub const MIN_ARTIFACT_BYTES: usize = 256;

/// Distinct authenticated-only finding types needed to call auth a success.
const AUTH_SUCCESS_THRESHOLD: usize = 5;

/// Plugins that positively report valid credentials.
const CREDENTIAL_SUCCESS_PLUGINS: &[u64] = &[141118, 110095];
/// Plugins that positively report credential failure.
const CREDENTIAL_FAILURE_PLUGINS: &[u64] = &[104410, 21745];
/// Plugins reporting logins that lack the privileges the scan asked for.
const INSUFFICIENT_PRIVILEGE_PLUGINS: &[u64] = &[110385];

/// Per-host credential marker, when the export carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HostCredentialMarker {
    Success,
    Failure,
}

fn host_marker(host: &HostReport) -> Option<HostCredentialMarker> {
    if let Some(value) = host.properties.get("Credentialed_Scan") {
        return Some(if value.eq_ignore_ascii_case("true") {
            HostCredentialMarker::Success
        } else {
            HostCredentialMarker::Failure
        });
    }
    let mut saw_success = false;
    for finding in &host.findings {
        if CREDENTIAL_FAILURE_PLUGINS.contains(&finding.plugin_id) {
            return Some(HostCredentialMarker::Failure);
        }
        if CREDENTIAL_SUCCESS_PLUGINS.contains(&finding.plugin_id) {
            saw_success = true;
        }
    }
    saw_success.then_some(HostCredentialMarker::Success)
}

/// Distinct finding types that require successful authentication: local
/// security checks only run with a working login.
fn auth_plugin_count(report: &ScanReport) -> usize {
    let mut plugins: HashSet<u64> = HashSet::new();
    for host in &report.hosts {
        for finding in &host.findings {
            if finding.plugin_family.contains("Local Security Checks") {
                plugins.insert(finding.plugin_id);
            }
        }
    }
    plugins.len()
}

fn has_insufficient_privilege_marker(report: &ScanReport) -> bool {
    report.hosts.iter().any(|host| {
        host.findings.iter().any(|finding| {
            INSUFFICIENT_PRIVILEGE_PLUGINS.contains(&finding.plugin_id)
                || finding.plugin_name.contains("Insufficient Privilege")
        })
    })
}

fn classify_authentication(
    scan_type: ScanType,
    report: &ScanReport,
    auth_plugins_found: usize,
    warnings: &mut Vec<String>,
) -> AuthenticationStatus {
    if scan_type == ScanType::Untrusted {
        return AuthenticationStatus::NotApplicable;
    }

    let markers: Vec<HostCredentialMarker> =
        report.hosts.iter().filter_map(host_marker).collect();
    let mut status = if !markers.is_empty() {
        let successes = markers
            .iter()
            .filter(|m| **m == HostCredentialMarker::Success)
            .count();
        if successes == markers.len() {
            AuthenticationStatus::Success
        } else if successes == 0 {
            AuthenticationStatus::Failed
        } else {
            warnings.push(format!(
                "credentials worked on {successes} of {} hosts",
                markers.len()
            ));
            AuthenticationStatus::Partial
        }
    } else if auth_plugins_found >= AUTH_SUCCESS_THRESHOLD {
        AuthenticationStatus::Success
    } else if auth_plugins_found >= 1 {
        warnings.push(format!(
            "only {auth_plugins_found} authenticated finding types present; results may be incomplete"
        ));
        AuthenticationStatus::Partial
    } else {
        AuthenticationStatus::Failed
    };

    // Insufficient-privilege markers cap a privileged scan at partial, no
    // matter how many authenticated finding types showed up.
    if scan_type.is_privileged() && has_insufficient_privilege_marker(report) {
        warnings.push(
            "login succeeded but privilege escalation was insufficient for some checks"
                .to_string(),
        );
        if status != AuthenticationStatus::Failed {
            status = AuthenticationStatus::Partial;
        }
    }

    status
}

/// Validate an exported artifact and classify its authentication outcome.
pub fn validate_artifact(scan_type: ScanType, bytes: &[u8]) -> ValidationReport {
    let artifact_bytes = bytes.len() as u64;
    if bytes.len() < MIN_ARTIFACT_BYTES {
        return ValidationReport::invalid(
            format!(
                "artifact is {} bytes, below the {MIN_ARTIFACT_BYTES} byte minimum",
                bytes.len()
            ),
            artifact_bytes,
        );
    }

    let report = match parse_report(bytes) {
        Ok(report) => report,
        Err(e) => {
            return ValidationReport::invalid(format!("artifact did not parse: {e}"), artifact_bytes)
        }
    };

    if report.hosts.is_empty() {
        let mut invalid =
            ValidationReport::invalid("artifact contains no scanned hosts", artifact_bytes);
        if scan_type == ScanType::Untrusted {
            invalid.authentication_status = AuthenticationStatus::NotApplicable;
        }
        return invalid;
    }

    let mut stats = ValidationStats {
        hosts: report.hosts.len() as u64,
        artifact_bytes,
        ..ValidationStats::default()
    };
    for host in &report.hosts {
        for finding in &host.findings {
            stats.severity.record(finding.severity);
        }
    }
    let auth_plugins_found = auth_plugin_count(&report);
    stats.auth_plugins_found = auth_plugins_found as u64;

    let mut warnings = Vec::new();
    let authentication_status =
        classify_authentication(scan_type, &report, auth_plugins_found, &mut warnings);

    ValidationReport {
        is_valid: true,
        error: None,
        warnings,
        stats,
        authentication_status,
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
