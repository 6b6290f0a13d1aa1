// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parser for the native scanner export (NessusClientData_v2 XML).
//!
//! Parsing is lazy and shared: the validator and the results view both run
//! over the same [`ScanReport`], read straight from the stored artifact.
//! Findings are attached to their enclosing `ReportHost`; items without a
//! host context are dropped.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("malformed export: {0}")]
    Malformed(String),
}

/// One vulnerability finding on one host.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub host: String,
    pub port: u16,
    pub protocol: String,
    pub service: String,
    pub plugin_id: u64,
    pub plugin_name: String,
    pub plugin_family: String,
    pub severity: u8,
    pub risk_factor: Option<String>,
    pub cvss_base_score: Option<f64>,
    pub cvss3_base_score: Option<f64>,
    pub cve: Vec<String>,
    pub synopsis: Option<String>,
    pub description: Option<String>,
    pub solution: Option<String>,
    pub plugin_output: Option<String>,
    pub see_also: Vec<String>,
    pub exploit_available: bool,
}

/// One scanned host with its property tags and findings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostReport {
    pub name: String,
    /// `HostProperties` tags, e.g. `host-ip`, `Credentialed_Scan`.
    pub properties: HashMap<String, String>,
    pub findings: Vec<Finding>,
}

/// Parsed scan export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    pub name: String,
    pub policy: Option<String>,
    pub hosts: Vec<HostReport>,
}

impl ScanReport {
    /// All findings in stable output order: host ascending, then plugin id,
    /// then port.
    pub fn sorted_findings(&self) -> Vec<&Finding> {
        let mut findings: Vec<&Finding> = self
            .hosts
            .iter()
            .flat_map(|host| host.findings.iter())
            .collect();
        findings.sort_by(|a, b| {
            a.host
                .cmp(&b.host)
                .then(a.plugin_id.cmp(&b.plugin_id))
                .then(a.port.cmp(&b.port))
        });
        findings
    }
}

fn attr_of(e: &quick_xml::events::BytesStart<'_>, name: &str) -> Result<Option<String>, ReportError> {
    let attr = e
        .try_get_attribute(name)
        .map_err(|err| ReportError::Malformed(err.to_string()))?;
    match attr {
        Some(attr) => {
            let value = attr
                .unescape_value()
                .map_err(|err| ReportError::Malformed(err.to_string()))?;
            Ok(Some(value.into_owned()))
        }
        None => Ok(None),
    }
}

fn finding_from_item(
    e: &quick_xml::events::BytesStart<'_>,
    host: &str,
) -> Result<Finding, ReportError> {
    Ok(Finding {
        host: host.to_string(),
        port: attr_of(e, "port")?.and_then(|v| v.parse().ok()).unwrap_or(0),
        protocol: attr_of(e, "protocol")?.unwrap_or_default(),
        service: attr_of(e, "svc_name")?.unwrap_or_default(),
        plugin_id: attr_of(e, "pluginID")?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        plugin_name: attr_of(e, "pluginName")?.unwrap_or_default(),
        plugin_family: attr_of(e, "pluginFamily")?.unwrap_or_default(),
        severity: attr_of(e, "severity")?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        risk_factor: None,
        cvss_base_score: None,
        cvss3_base_score: None,
        cve: Vec::new(),
        synopsis: None,
        description: None,
        solution: None,
        plugin_output: None,
        see_also: Vec::new(),
        exploit_available: false,
    })
}

/// Parse a native export. Fails on malformed XML; an export with zero hosts
/// parses fine (the validator rejects it separately).
pub fn parse_report(bytes: &[u8]) -> Result<ScanReport, ReportError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut report = ScanReport::default();
    let mut saw_root = false;
    let mut current_host: Option<HostReport> = None;
    let mut current_item: Option<Finding> = None;
    let mut current_element: Option<String> = None;
    let mut current_tag_name: Option<String> = None;
    let mut in_policy = false;
    let mut in_host_properties = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"NessusClientData_v2" => saw_root = true,
                b"Policy" => in_policy = true,
                b"Report" => {
                    report.name = attr_of(&e, "name")?.unwrap_or_default();
                }
                b"ReportHost" => {
                    current_host = Some(HostReport {
                        name: attr_of(&e, "name")?.unwrap_or_default(),
                        ..HostReport::default()
                    });
                }
                b"HostProperties" => in_host_properties = true,
                b"tag" if in_host_properties => {
                    current_tag_name = attr_of(&e, "name")?;
                }
                b"ReportItem" => {
                    current_item = match &current_host {
                        Some(host) => Some(finding_from_item(&e, &host.name)?),
                        None => None,
                    };
                }
                other => {
                    current_element = Some(String::from_utf8_lossy(other).into_owned());
                }
            },
            Event::Empty(e) => {
                if e.name().as_ref() == b"ReportItem" {
                    if let Some(host) = current_host.as_mut() {
                        let name = host.name.clone();
                        host.findings.push(finding_from_item(&e, &name)?);
                    }
                }
            }
            Event::Text(t) => {
                let decoded = t
                    .decode()
                    .map_err(|err| ReportError::Malformed(err.to_string()))?;
                let text = quick_xml::escape::unescape(&decoded)
                    .map_err(|err| ReportError::Malformed(err.to_string()))?
                    .into_owned();
                if let (true, Some(tag)) = (in_host_properties, &current_tag_name) {
                    if let Some(host) = current_host.as_mut() {
                        host.properties.insert(tag.clone(), text);
                    }
                } else if let Some(item) = current_item.as_mut() {
                    apply_item_field(item, current_element.as_deref(), &text);
                } else if in_policy && current_element.as_deref() == Some("policyName") {
                    report.policy = Some(text);
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"Policy" => in_policy = false,
                b"HostProperties" => {
                    in_host_properties = false;
                    current_tag_name = None;
                }
                b"tag" => current_tag_name = None,
                b"ReportItem" => {
                    if let (Some(host), Some(item)) = (current_host.as_mut(), current_item.take()) {
                        host.findings.push(item);
                    }
                }
                b"ReportHost" => {
                    if let Some(host) = current_host.take() {
                        report.hosts.push(host);
                    }
                }
                _ => current_element = None,
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(ReportError::Malformed(
            "missing NessusClientData_v2 root element".to_string(),
        ));
    }
    Ok(report)
}

fn apply_item_field(item: &mut Finding, element: Option<&str>, text: &str) {
    match element {
        Some("risk_factor") => item.risk_factor = Some(text.to_string()),
        Some("cvss_base_score") => item.cvss_base_score = text.parse().ok(),
        Some("cvss3_base_score") => item.cvss3_base_score = text.parse().ok(),
        Some("cve") => item.cve.push(text.to_string()),
        Some("synopsis") => item.synopsis = Some(text.to_string()),
        Some("description") => item.description = Some(text.to_string()),
        Some("solution") => item.solution = Some(text.to_string()),
        Some("plugin_output") => item.plugin_output = Some(text.to_string()),
        Some("see_also") => item.see_also.push(text.to_string()),
        Some("exploit_available") => item.exploit_available = text.eq_ignore_ascii_case("true"),
        _ => {}
    }
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
