// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests: native-export builders and a wired
//! store/queue/registry/driver harness.

use scanq_core::FakeClock;
use scanq_queue::MemoryQueue;
use scanq_scanner::{
    FakeDriverFactory, FakeScannerDriver, InstanceConfig, PoolMap, ScannerRegistry,
};
use scanq_store::TaskStore;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::watch;

/// A `ReportItem` element with the standard attributes.
pub fn item(plugin_id: u64, plugin_name: &str, plugin_family: &str, severity: u8) -> String {
    format!(
        r#"<ReportItem port="0" svc_name="general" protocol="tcp" severity="{severity}" pluginID="{plugin_id}" pluginName="{plugin_name}" pluginFamily="{plugin_family}"><risk_factor>None</risk_factor></ReportItem>"#
    )
}

/// A fully populated `ReportItem` for results-view tests.
pub fn rich_item(plugin_id: u64, plugin_name: &str, severity: u8, port: u16, cvss3: f64) -> String {
    format!(
        r#"<ReportItem port="{port}" svc_name="ssh" protocol="tcp" severity="{severity}" pluginID="{plugin_id}" pluginName="{plugin_name}" pluginFamily="General">
<risk_factor>High</risk_factor>
<cvss_base_score>7.5</cvss_base_score>
<cvss3_base_score>{cvss3}</cvss3_base_score>
<cve>CVE-2024-{plugin_id}</cve>
<synopsis>Synopsis for {plugin_name}</synopsis>
<description>Description for {plugin_name}</description>
<solution>Upgrade the affected package</solution>
<plugin_output>output text</plugin_output>
<see_also>https://example.com/{plugin_id}</see_also>
<exploit_available>true</exploit_available>
</ReportItem>"#
    )
}

/// A `ReportHost`, optionally with a `Credentialed_Scan` marker tag.
pub fn host(name: &str, credentialed: Option<bool>, items: &str) -> String {
    let marker = credentialed
        .map(|c| format!(r#"<tag name="Credentialed_Scan">{c}</tag>"#))
        .unwrap_or_default();
    format!(
        r#"<ReportHost name="{name}"><HostProperties><tag name="host-ip">{name}</tag>{marker}</HostProperties>{items}</ReportHost>"#
    )
}

/// Wrap hosts into a complete NessusClientData_v2 document.
pub fn export(hosts: &str) -> Vec<u8> {
    format!(
        r#"<?xml version="1.0" ?>
<NessusClientData_v2>
<Policy><policyName>Advanced Scan</policyName></Policy>
<Report name="fixture-scan">
{hosts}
</Report>
</NessusClientData_v2>"#
    )
    .into_bytes()
}

/// Two hosts, five findings, no credential markers. Comfortably above the
/// minimum artifact size.
pub fn untrusted_export() -> Vec<u8> {
    let host_a = host(
        "10.0.0.5",
        None,
        &[
            rich_item(11111, "OpenSSH Outdated", 3, 22, 8.1),
            rich_item(22222, "TLS Weak Cipher", 2, 443, 5.3),
            item(10180, "Ping the remote host", "Port scanners", 0),
        ]
        .join(""),
    );
    let host_b = host(
        "10.0.0.6",
        None,
        &[
            rich_item(11111, "OpenSSH Outdated", 3, 22, 8.1),
            rich_item(33333, "Kernel Vuln", 4, 0, 9.8),
        ]
        .join(""),
    );
    export(&format!("{host_a}{host_b}"))
}

/// Local-security-check items indicating successful authentication.
pub fn local_check_items(count: u64) -> String {
    (0..count)
        .map(|i| {
            item(
                500_000 + i,
                &format!("Ubuntu Patch Check {i}"),
                "Ubuntu Local Security Checks",
                1,
            )
        })
        .collect()
}

pub fn pool_map() -> PoolMap {
    let mut pools = PoolMap::new();
    pools.insert(
        "nessus".to_string(),
        vec![
            instance_config("scanner-01", 2),
            instance_config("scanner-02", 2),
        ],
    );
    pools.insert("nessus-dmz".to_string(), vec![instance_config("dmz-01", 1)]);
    pools
}

pub fn instance_config(id: &str, max_concurrent: u32) -> InstanceConfig {
    InstanceConfig {
        instance_id: id.to_string(),
        name: format!("Scanner {id}"),
        endpoint: format!("https://{id}.internal:8834"),
        username: "svc".to_string(),
        password: "pw".to_string(),
        max_concurrent,
        enabled: true,
    }
}

/// Everything a worker test needs, wired together with fakes.
pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<TaskStore>,
    pub queue: Arc<MemoryQueue>,
    pub registry: Arc<ScannerRegistry>,
    pub driver: FakeScannerDriver,
    pub factory: Arc<FakeDriverFactory>,
    pub clock: FakeClock,
    pub shutdown_tx: watch::Sender<bool>,
    pub shutdown_rx: watch::Receiver<bool>,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(TaskStore::open(dir.path()).unwrap());
        let driver = FakeScannerDriver::new();
        driver.set_export_bytes(untrusted_export());
        let factory = Arc::new(FakeDriverFactory::new(driver.clone()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            dir,
            store,
            queue: Arc::new(MemoryQueue::new()),
            registry: Arc::new(ScannerRegistry::new(pool_map())),
            driver,
            factory,
            clock: FakeClock::default(),
            shutdown_tx,
            shutdown_rx,
        }
    }
}
