// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{export, host, item, rich_item, untrusted_export};

#[test]
fn parses_report_and_policy_names() {
    let report = parse_report(&untrusted_export()).unwrap();
    assert_eq!(report.name, "fixture-scan");
    assert_eq!(report.policy.as_deref(), Some("Advanced Scan"));
}

#[test]
fn parses_hosts_with_properties_and_findings() {
    let report = parse_report(&untrusted_export()).unwrap();
    assert_eq!(report.hosts.len(), 2);

    let first = &report.hosts[0];
    assert_eq!(first.name, "10.0.0.5");
    assert_eq!(first.properties.get("host-ip").map(String::as_str), Some("10.0.0.5"));
    assert_eq!(first.findings.len(), 3);
}

#[test]
fn parses_item_fields() {
    let bytes = export(&host("10.0.0.5", None, &rich_item(11111, "OpenSSH Outdated", 3, 22, 8.1)));
    let report = parse_report(&bytes).unwrap();
    let finding = &report.hosts[0].findings[0];

    assert_eq!(finding.host, "10.0.0.5");
    assert_eq!(finding.port, 22);
    assert_eq!(finding.protocol, "tcp");
    assert_eq!(finding.service, "ssh");
    assert_eq!(finding.plugin_id, 11111);
    assert_eq!(finding.plugin_name, "OpenSSH Outdated");
    assert_eq!(finding.severity, 3);
    assert_eq!(finding.risk_factor.as_deref(), Some("High"));
    assert_eq!(finding.cvss_base_score, Some(7.5));
    assert_eq!(finding.cvss3_base_score, Some(8.1));
    assert_eq!(finding.cve, vec!["CVE-2024-11111"]);
    assert_eq!(finding.synopsis.as_deref(), Some("Synopsis for OpenSSH Outdated"));
    assert_eq!(finding.solution.as_deref(), Some("Upgrade the affected package"));
    assert_eq!(finding.see_also, vec!["https://example.com/11111"]);
    assert!(finding.exploit_available);
}

#[test]
fn credentialed_scan_marker_survives() {
    let bytes = export(&host("10.0.0.5", Some(true), &item(1, "x", "General", 0)));
    let report = parse_report(&bytes).unwrap();
    assert_eq!(
        report.hosts[0].properties.get("Credentialed_Scan").map(String::as_str),
        Some("true")
    );
}

#[test]
fn malformed_xml_is_an_error() {
    // Mismatched end tags
    assert!(parse_report(b"<NessusClientData_v2><Report></Oops></NessusClientData_v2>").is_err());
    // Not a scanner export at all
    assert!(parse_report(b"{\"not\": \"xml\"}").is_err());
    assert!(parse_report(b"").is_err());
}

#[test]
fn empty_report_parses_with_zero_hosts() {
    let report = parse_report(&export("")).unwrap();
    assert!(report.hosts.is_empty());
}

#[test]
fn items_without_a_host_are_dropped() {
    let stray = item(99, "stray", "General", 1);
    let bytes = format!(
        r#"<NessusClientData_v2><Report name="r">{stray}{}</Report></NessusClientData_v2>"#,
        host("10.0.0.5", None, &item(1, "kept", "General", 1))
    );
    let report = parse_report(bytes.as_bytes()).unwrap();
    assert_eq!(report.hosts.len(), 1);
    assert_eq!(report.hosts[0].findings.len(), 1);
    assert_eq!(report.hosts[0].findings[0].plugin_name, "kept");
}

#[test]
fn sorted_findings_order_by_host_then_plugin() {
    let bytes = export(&format!(
        "{}{}",
        host(
            "10.0.0.9",
            None,
            &format!("{}{}", item(300, "c", "General", 1), item(100, "a", "General", 1))
        ),
        host("10.0.0.1", None, &item(200, "b", "General", 1)),
    ));
    let report = parse_report(&bytes).unwrap();
    let order: Vec<(String, u64)> = report
        .sorted_findings()
        .iter()
        .map(|f| (f.host.clone(), f.plugin_id))
        .collect();
    assert_eq!(
        order,
        vec![
            ("10.0.0.1".to_string(), 200),
            ("10.0.0.9".to_string(), 100),
            ("10.0.0.9".to_string(), 300),
        ]
    );
}

#[test]
fn parse_is_deterministic() {
    let bytes = untrusted_export();
    let a = parse_report(&bytes).unwrap();
    let b = parse_report(&bytes).unwrap();
    assert_eq!(a, b);
}
