// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idempotency fingerprint over canonicalized submission inputs.
//!
//! The fingerprint excludes cosmetic fields (`name`, `description`) so a
//! client retrying the same work with a tweaked display name still dedups.
//! Secrets contribute to the digest but are never stored.

use crate::payload::ScanPayload;
use crate::task::ScanType;
use sha2::{Digest, Sha256};

/// Stable SHA-256 hex digest of the non-cosmetic submission inputs.
pub fn request_fingerprint(
    scan_type: ScanType,
    payload: &ScanPayload,
    scanner_pool: Option<&str>,
    scanner_instance: Option<&str>,
) -> String {
    let mut hasher = Sha256::new();

    // Targets: trimmed, empties dropped, sorted for order independence.
    let mut targets = payload.target_list();
    targets.sort();
    hasher.update(targets.join(","));
    hasher.update([0]);

    hasher.update(scan_type.to_string());
    hasher.update([0]);
    hasher.update(payload.schema_profile.as_deref().unwrap_or(""));
    hasher.update([0]);
    hasher.update(scanner_pool.unwrap_or(""));
    hasher.update([0]);
    hasher.update(scanner_instance.unwrap_or(""));
    hasher.update([0]);

    if let Some(creds) = &payload.credentials {
        hasher.update(format!("{:?}", creds.kind));
        hasher.update([0]);
        hasher.update(&creds.username);
        hasher.update([0]);
        hasher.update(&creds.secret);
        hasher.update([0]);
        if let Some(esc) = &creds.escalation {
            hasher.update(esc.method.to_string());
            hasher.update([0]);
            hasher.update(esc.account.as_deref().unwrap_or(""));
            hasher.update([0]);
            hasher.update(esc.secret.as_deref().unwrap_or(""));
            hasher.update([0]);
        }
    }

    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

#[cfg(test)]
#[path = "fingerprint_tests.rs"]
mod tests;
