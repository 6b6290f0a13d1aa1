// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    ip_exact           = { "10.0.0.5", "10.0.0.5", true },
    ip_mismatch        = { "10.0.0.5", "10.0.0.6", false },
    ip_in_stored_cidr  = { "10.0.0.0/24", "10.0.0.5", true },
    cidr_covers_stored = { "10.0.0.5", "10.0.0.0/24", true },
    cidr_overlap       = { "10.0.0.0/24", "10.0.0.0/16", true },
    cidr_disjoint      = { "10.0.0.0/24", "10.1.0.0/24", false },
    ip_misses_cidr     = { "10.0.0.0/8", "192.168.1.1", false },
    host_exact         = { "web-01.example.com", "web-01.example.com", true },
    host_case_fold     = { "WEB-01.Example.COM", "web-01.example.com", true },
    host_mismatch      = { "web-01.example.com", "web-02.example.com", false },
    host_vs_ip         = { "web-01.example.com", "10.0.0.5", false },
    ip_vs_host         = { "10.0.0.5", "web-01.example.com", false },
)]
fn matching(stored: &str, query: &str, expected: bool) {
    assert_eq!(
        Target::parse(stored).matches(&Target::parse(query)),
        expected,
        "stored={stored} query={query}"
    );
}

#[test]
fn matching_is_symmetric() {
    let pairs = [
        ("10.0.0.0/24", "10.0.0.5"),
        ("10.0.0.0/24", "10.0.0.0/16"),
        ("web-01", "WEB-01"),
    ];
    for (a, b) in pairs {
        let (a, b) = (Target::parse(a), Target::parse(b));
        assert_eq!(a.matches(&b), b.matches(&a));
    }
}

#[test]
fn any_target_matches_scans_the_list() {
    assert!(any_target_matches("192.168.1.1, 10.0.0.0/24", "10.0.0.7"));
    assert!(!any_target_matches("192.168.1.1, 10.0.0.0/24", "172.16.0.1"));
    assert!(any_target_matches(" db-01 , web-01 ", "WEB-01"));
}

#[test]
fn unparseable_falls_back_to_hostname() {
    assert_eq!(
        Target::parse("not an ip"),
        Target::Host("not an ip".to_string())
    );
}
