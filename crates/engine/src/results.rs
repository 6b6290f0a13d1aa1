// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Results view: projection, filtering, pagination, NDJSON assembly.
//!
//! Output shape, line by line:
//! 1. `{"type":"schema", ...}` — profile, projected fields, the filters
//!    that were applied, and the pre-filter vulnerability count.
//! 2. `{"type":"scan_metadata", ...}`
//! 3. One vulnerability record per line, ordered (host asc, plugin id asc).
//! 4. When paginated, a trailing `{"type":"pagination", ...}` line.

use crate::error::EngineError;
use crate::report::{parse_report, Finding};
use scanq_core::time_fmt::rfc3339_micros;
use scanq_core::TaskRecord;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

pub const MIN_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

const MINIMAL_FIELDS: &[&str] = &["host", "plugin_id", "plugin_name", "severity"];
const SUMMARY_FIELDS: &[&str] = &[
    "host",
    "plugin_id",
    "plugin_name",
    "severity",
    "port",
    "protocol",
    "risk_factor",
    "cvss3_base_score",
];
const BRIEF_FIELDS: &[&str] = &[
    "host",
    "plugin_id",
    "plugin_name",
    "severity",
    "port",
    "protocol",
    "risk_factor",
    "cvss3_base_score",
    "cve",
    "synopsis",
    "exploit_available",
];
const FULL_FIELDS: &[&str] = &[
    "host",
    "plugin_id",
    "plugin_name",
    "severity",
    "port",
    "protocol",
    "service",
    "plugin_family",
    "risk_factor",
    "cvss_base_score",
    "cvss3_base_score",
    "cve",
    "synopsis",
    "description",
    "solution",
    "plugin_output",
    "see_also",
    "exploit_available",
];

/// Fixed field-projection profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaProfile {
    Minimal,
    Summary,
    Brief,
    Full,
}

impl SchemaProfile {
    pub fn parse(name: &str) -> Result<Self, EngineError> {
        match name {
            "minimal" => Ok(SchemaProfile::Minimal),
            "summary" => Ok(SchemaProfile::Summary),
            "brief" => Ok(SchemaProfile::Brief),
            "full" => Ok(SchemaProfile::Full),
            other => Err(EngineError::Validation(format!(
                "unknown schema profile: {other}"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SchemaProfile::Minimal => "minimal",
            SchemaProfile::Summary => "summary",
            SchemaProfile::Brief => "brief",
            SchemaProfile::Full => "full",
        }
    }

    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            SchemaProfile::Minimal => MINIMAL_FIELDS,
            SchemaProfile::Summary => SUMMARY_FIELDS,
            SchemaProfile::Brief => BRIEF_FIELDS,
            SchemaProfile::Full => FULL_FIELDS,
        }
    }
}

/// Caller parameters for a results read.
#[derive(Debug, Clone, Default)]
pub struct ResultsQuery {
    /// 0 returns everything with no pagination line.
    pub page: u32,
    /// Clamped to `[MIN_PAGE_SIZE, MAX_PAGE_SIZE]`.
    pub page_size: u32,
    pub schema_profile: Option<String>,
    pub custom_fields: Option<Vec<String>>,
    /// Field -> matcher, AND-combined.
    pub filters: BTreeMap<String, String>,
}

fn finding_value(finding: &Finding) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("host".into(), json!(finding.host));
    map.insert("port".into(), json!(finding.port));
    map.insert("protocol".into(), json!(finding.protocol));
    map.insert("service".into(), json!(finding.service));
    map.insert("plugin_id".into(), json!(finding.plugin_id));
    map.insert("plugin_name".into(), json!(finding.plugin_name));
    map.insert("plugin_family".into(), json!(finding.plugin_family));
    map.insert("severity".into(), json!(finding.severity));
    map.insert("risk_factor".into(), json!(finding.risk_factor));
    map.insert("cvss_base_score".into(), json!(finding.cvss_base_score));
    map.insert("cvss3_base_score".into(), json!(finding.cvss3_base_score));
    map.insert("cve".into(), json!(finding.cve));
    map.insert("synopsis".into(), json!(finding.synopsis));
    map.insert("description".into(), json!(finding.description));
    map.insert("solution".into(), json!(finding.solution));
    map.insert("plugin_output".into(), json!(finding.plugin_output));
    map.insert("see_also".into(), json!(finding.see_also));
    map.insert("exploit_available".into(), json!(finding.exploit_available));
    map
}

fn numeric_matches(actual: f64, matcher: &str) -> Result<bool, EngineError> {
    let (op, raw) = if let Some(rest) = matcher.strip_prefix(">=") {
        (">=", rest)
    } else if let Some(rest) = matcher.strip_prefix("<=") {
        ("<=", rest)
    } else if let Some(rest) = matcher.strip_prefix('>') {
        (">", rest)
    } else if let Some(rest) = matcher.strip_prefix('<') {
        ("<", rest)
    } else if let Some(rest) = matcher.strip_prefix('=') {
        ("=", rest)
    } else {
        ("=", matcher)
    };
    let value: f64 = raw.trim().parse().map_err(|_| {
        EngineError::Validation(format!("numeric filter value did not parse: {matcher}"))
    })?;
    Ok(match op {
        ">" => actual > value,
        ">=" => actual >= value,
        "<" => actual < value,
        "<=" => actual <= value,
        _ => (actual - value).abs() < f64::EPSILON,
    })
}

fn value_matches(value: &Value, matcher: &str) -> Result<bool, EngineError> {
    match value {
        Value::Number(n) => numeric_matches(n.as_f64().unwrap_or(0.0), matcher),
        Value::Bool(b) => Ok(matcher.eq_ignore_ascii_case(if *b { "true" } else { "false" })),
        Value::Array(items) => Ok(items.iter().any(|item| {
            item.as_str()
                .map(|s| s.to_lowercase().contains(&matcher.to_lowercase()))
                .unwrap_or(false)
        })),
        Value::String(s) => Ok(s.to_lowercase().contains(&matcher.to_lowercase())),
        Value::Null => Ok(false),
        Value::Object(_) => Ok(false),
    }
}

fn resolve_fields(
    record: &TaskRecord,
    query: &ResultsQuery,
) -> Result<(String, Vec<String>), EngineError> {
    if let Some(custom) = &query.custom_fields {
        if let Some(profile) = &query.schema_profile {
            if profile != "brief" {
                return Err(EngineError::Validation(format!(
                    "custom_fields cannot be combined with schema profile '{profile}'"
                )));
            }
        }
        if custom.is_empty() {
            return Err(EngineError::Validation(
                "custom_fields must not be empty".to_string(),
            ));
        }
        for field in custom {
            if !FULL_FIELDS.contains(&field.as_str()) {
                return Err(EngineError::Validation(format!(
                    "unknown result field: {field}"
                )));
            }
        }
        return Ok(("custom".to_string(), custom.clone()));
    }

    let name = query
        .schema_profile
        .clone()
        .or_else(|| record.payload.schema_profile.clone())
        .unwrap_or_else(|| "brief".to_string());
    let profile = SchemaProfile::parse(&name)?;
    Ok((
        profile.name().to_string(),
        profile.fields().iter().map(|f| f.to_string()).collect(),
    ))
}

/// Render the NDJSON results stream for a stored artifact.
pub fn render_results(
    record: &TaskRecord,
    artifact: &[u8],
    query: &ResultsQuery,
) -> Result<String, EngineError> {
    let report = parse_report(artifact)
        .map_err(|e| EngineError::Artifact(format!("stored artifact did not parse: {e}")))?;
    let (profile_name, fields) = resolve_fields(record, query)?;

    for field in query.filters.keys() {
        if !FULL_FIELDS.contains(&field.as_str()) {
            return Err(EngineError::Validation(format!(
                "unknown filter field: {field}"
            )));
        }
    }

    let all: Vec<Map<String, Value>> = report
        .sorted_findings()
        .into_iter()
        .map(finding_value)
        .collect();
    let total_vulnerabilities = all.len();

    let mut filtered = Vec::with_capacity(all.len());
    for candidate in all {
        let mut keep = true;
        for (field, matcher) in &query.filters {
            let value = candidate.get(field).unwrap_or(&Value::Null);
            if !value_matches(value, matcher)? {
                keep = false;
                break;
            }
        }
        if keep {
            filtered.push(candidate);
        }
    }

    let mut lines: Vec<String> = Vec::with_capacity(filtered.len() + 3);
    lines.push(
        json!({
            "type": "schema",
            "profile": profile_name,
            "fields": fields,
            "filters_applied": query.filters,
            "total_vulnerabilities": total_vulnerabilities,
        })
        .to_string(),
    );
    lines.push(
        json!({
            "type": "scan_metadata",
            "name": record.payload.name,
            "targets": record.payload.target_list(),
            "scan_start": record.started_at.map(rfc3339_micros),
            "scan_end": record.completed_at.map(rfc3339_micros),
            "policy": report.policy,
        })
        .to_string(),
    );

    let project = |candidate: &Map<String, Value>| -> String {
        let mut projected = Map::new();
        for field in &fields {
            projected.insert(
                field.clone(),
                candidate.get(field).cloned().unwrap_or(Value::Null),
            );
        }
        Value::Object(projected).to_string()
    };

    if query.page == 0 {
        for candidate in &filtered {
            lines.push(project(candidate));
        }
    } else {
        let page_size = query.page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE);
        let total_pages = (filtered.len() as u32).div_ceil(page_size);
        let start = (query.page - 1) as usize * page_size as usize;
        let end = (start + page_size as usize).min(filtered.len());
        if start < filtered.len() {
            for candidate in &filtered[start..end] {
                lines.push(project(candidate));
            }
        }
        lines.push(
            json!({
                "type": "pagination",
                "page": query.page,
                "page_size": page_size,
                "has_next": query.page < total_pages,
                "total_pages": total_pages,
            })
            .to_string(),
        );
    }

    Ok(lines.join("\n") + "\n")
}

#[cfg(test)]
#[path = "results_tests.rs"]
mod tests;
