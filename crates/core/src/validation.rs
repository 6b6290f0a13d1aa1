// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Validation outcome types for exported scan artifacts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Authentication outcome classified from an exported artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationStatus {
    Success,
    Failed,
    Partial,
    NotApplicable,
}

impl fmt::Display for AuthenticationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthenticationStatus::Success => write!(f, "success"),
            AuthenticationStatus::Failed => write!(f, "failed"),
            AuthenticationStatus::Partial => write!(f, "partial"),
            AuthenticationStatus::NotApplicable => write!(f, "not_applicable"),
        }
    }
}

/// Finding counts bucketed by severity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: u64,
    pub high: u64,
    pub medium: u64,
    pub low: u64,
    pub info: u64,
}

impl SeverityCounts {
    /// Record one finding at the native severity level (0=info .. 4=critical).
    pub fn record(&mut self, severity: u8) {
        match severity {
            4 => self.critical += 1,
            3 => self.high += 1,
            2 => self.medium += 1,
            1 => self.low += 1,
            _ => self.info += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.critical + self.high + self.medium + self.low + self.info
    }
}

/// Summary persisted on a COMPLETED task record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsSummary {
    pub host_count: u64,
    pub total_findings: u64,
    pub severity: SeverityCounts,
    pub artifact_bytes: u64,
}

/// Raw counters gathered while validating an artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationStats {
    pub hosts: u64,
    pub severity: SeverityCounts,
    pub artifact_bytes: u64,
    /// Count of distinct finding types that only appear when target
    /// authentication succeeded.
    pub auth_plugins_found: u64,
}

/// Outcome of validating an exported artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub stats: ValidationStats,
    pub authentication_status: AuthenticationStatus,
}

impl ValidationReport {
    /// An invalid report with `not_applicable` authentication.
    pub fn invalid(error: impl Into<String>, artifact_bytes: u64) -> Self {
        Self {
            is_valid: false,
            error: Some(error.into()),
            warnings: Vec::new(),
            stats: ValidationStats {
                artifact_bytes,
                ..ValidationStats::default()
            },
            authentication_status: AuthenticationStatus::NotApplicable,
        }
    }

    /// Summary suitable for persisting on the task record.
    pub fn results_summary(&self) -> ResultsSummary {
        ResultsSummary {
            host_count: self.stats.hosts,
            total_findings: self.stats.severity.total(),
            severity: self.stats.severity.clone(),
            artifact_bytes: self.stats.artifact_bytes,
        }
    }
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod tests;
