// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CIDR-aware target matching for task listing filters.
//!
//! A stored target or a filter query may each be a bare IP, a CIDR block,
//! or a hostname. Matching rules:
//! - IP vs IP: exact equality.
//! - IP vs CIDR (either side): network containment.
//! - CIDR vs CIDR: overlap.
//! - Hostname vs hostname: case-insensitive equality.
//! - Hostname vs IP/CIDR: never matches.

use ipnetwork::IpNetwork;
use std::net::IpAddr;

/// A parsed target expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Ip(IpAddr),
    Cidr(IpNetwork),
    Host(String),
}

impl Target {
    /// Parse a target string. Anything that is neither an IP nor a CIDR is
    /// treated as a hostname.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if let Ok(ip) = s.parse::<IpAddr>() {
            return Target::Ip(ip);
        }
        if let Ok(net) = s.parse::<IpNetwork>() {
            return Target::Cidr(net);
        }
        Target::Host(s.to_string())
    }

    /// Whether this target matches `other` per the module rules. Symmetric.
    pub fn matches(&self, other: &Target) -> bool {
        match (self, other) {
            (Target::Ip(a), Target::Ip(b)) => a == b,
            (Target::Ip(ip), Target::Cidr(net)) | (Target::Cidr(net), Target::Ip(ip)) => {
                net.contains(*ip)
            }
            (Target::Cidr(a), Target::Cidr(b)) => {
                a.contains(b.network()) || b.contains(a.network())
            }
            (Target::Host(a), Target::Host(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }
}

/// Whether any entry in a comma-separated target string matches `query`.
pub fn any_target_matches(stored_targets: &str, query: &str) -> bool {
    let query = Target::parse(query);
    stored_targets
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .any(|t| Target::parse(t).matches(&query))
}

#[cfg(test)]
#[path = "target_tests.rs"]
mod tests;
