// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Submission payload: targets, naming, and scan credentials.
//!
//! Credentials live in the payload only while a task is QUEUED. The worker
//! scrubs them from the persisted record once the remote scan has been
//! created, and every `Debug` rendering redacts secret material.

use crate::task::ScanType;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Payload validation failures, surfaced to the client before any state
/// change.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("targets must not be empty")]
    EmptyTargets,
    #[error("name must not be empty")]
    EmptyName,
    #[error("scan type {0} requires credentials")]
    MissingCredentials(ScanType),
    #[error("privileged scan requires a privilege escalation method")]
    MissingEscalation,
    #[error("credential username must not be empty")]
    EmptyUsername,
    #[error("{0} credentials require a non-empty {1}")]
    MissingSecret(&'static str, &'static str),
    #[error("unknown escalation method: {0}")]
    UnknownEscalationMethod(String),
}

/// How the scanner authenticates to targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// SSH with a password; `secret` holds the password.
    SshPassword,
    /// SSH with a key; `secret` holds a key reference (path or vault id).
    SshKey,
}

/// Privilege escalation method for privileged scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscalationMethod {
    #[serde(rename = "sudo")]
    Sudo,
    #[serde(rename = "su")]
    Su,
    #[serde(rename = "su+sudo")]
    SuSudo,
    #[serde(rename = "pbrun")]
    Pbrun,
    #[serde(rename = "dzdo")]
    Dzdo,
}

impl EscalationMethod {
    pub fn parse(s: &str) -> Result<Self, PayloadError> {
        match s {
            "sudo" => Ok(EscalationMethod::Sudo),
            "su" => Ok(EscalationMethod::Su),
            "su+sudo" => Ok(EscalationMethod::SuSudo),
            "pbrun" => Ok(EscalationMethod::Pbrun),
            "dzdo" => Ok(EscalationMethod::Dzdo),
            other => Err(PayloadError::UnknownEscalationMethod(other.to_string())),
        }
    }
}

impl fmt::Display for EscalationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EscalationMethod::Sudo => write!(f, "sudo"),
            EscalationMethod::Su => write!(f, "su"),
            EscalationMethod::SuSudo => write!(f, "su+sudo"),
            EscalationMethod::Pbrun => write!(f, "pbrun"),
            EscalationMethod::Dzdo => write!(f, "dzdo"),
        }
    }
}

/// Privilege escalation settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Escalation {
    pub method: EscalationMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl fmt::Debug for Escalation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Escalation")
            .field("method", &self.method)
            .field("account", &self.account)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Target credentials for authenticated scans.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub kind: CredentialKind,
    pub username: String,
    pub secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation: Option<Escalation>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("kind", &self.kind)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .field("escalation", &self.escalation)
            .finish()
    }
}

/// Inputs captured at submission.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanPayload {
    /// Comma-separated IPs, CIDRs, and hostnames.
    pub targets: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

impl fmt::Debug for ScanPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanPayload")
            .field("targets", &self.targets)
            .field("name", &self.name)
            .field("description", &self.description)
            .field("schema_profile", &self.schema_profile)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl ScanPayload {
    /// Split the raw target string into trimmed, non-empty entries.
    pub fn target_list(&self) -> Vec<String> {
        self.targets
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Validate submission inputs against the rules for `scan_type`.
    pub fn validate(&self, scan_type: ScanType) -> Result<(), PayloadError> {
        if self.target_list().is_empty() {
            return Err(PayloadError::EmptyTargets);
        }
        if self.name.trim().is_empty() {
            return Err(PayloadError::EmptyName);
        }
        match (&self.credentials, scan_type.requires_credentials()) {
            (None, true) => return Err(PayloadError::MissingCredentials(scan_type)),
            (Some(creds), _) => creds.validate(scan_type)?,
            (None, false) => {}
        }
        Ok(())
    }

    /// Drop credential material from the payload. Called by the worker once
    /// the driver has received it; the scrubbed payload is what persists.
    pub fn scrub_credentials(&mut self) {
        self.credentials = None;
    }
}

impl Credentials {
    fn validate(&self, scan_type: ScanType) -> Result<(), PayloadError> {
        if self.username.trim().is_empty() {
            return Err(PayloadError::EmptyUsername);
        }
        if self.secret.is_empty() {
            let what = match self.kind {
                CredentialKind::SshPassword => ("ssh_password", "password"),
                CredentialKind::SshKey => ("ssh_key", "key reference"),
            };
            return Err(PayloadError::MissingSecret(what.0, what.1));
        }
        if scan_type.is_privileged() && self.escalation.is_none() {
            return Err(PayloadError::MissingEscalation);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
