// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Nessus driver: JSON API over HTTPS with session-token auth.
//!
//! Scanner endpoints routinely run self-signed certificates, so the client
//! accepts invalid certs. Session tokens are re-acquired on 401/403
//! transparently to the caller; transient network failures are retried with
//! bounded exponential backoff inside each capability call.

use crate::config::InstanceConfig;
use crate::driver::{
    DriverError, DriverFactory, RemoteScanState, RemoteStatus, ScanRequest, ScannerDriver,
};
use crate::registry::ScannerKind;
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Method, StatusCode, Url};
use scanq_core::{CredentialKind, Credentials, EscalationMethod};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

/// Per-call HTTP timeout.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// Bound on the remote export request -> ready -> download flow.
const EXPORT_TIMEOUT: Duration = Duration::from_secs(300);
const EXPORT_POLL_INTERVAL: Duration = Duration::from_secs(3);
/// Transient failures are retried this many times per capability call.
const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Driver for one Nessus instance.
pub struct NessusDriver {
    http: reqwest::Client,
    base: Url,
    username: String,
    password: String,
    token: AsyncMutex<Option<String>>,
    template_uuid: AsyncMutex<Option<String>>,
}

impl NessusDriver {
    pub fn new(config: &InstanceConfig) -> Result<Self, DriverError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| DriverError::Permanent(format!("http client: {e}")))?;
        let base = Url::parse(&config.endpoint)
            .map_err(|e| DriverError::Permanent(format!("bad endpoint {}: {e}", config.endpoint)))?;
        Ok(Self {
            http,
            base,
            username: config.username.clone(),
            password: config.password.clone(),
            token: AsyncMutex::new(None),
            template_uuid: AsyncMutex::new(None),
        })
    }

    fn url(&self, path: &str) -> Result<Url, DriverError> {
        self.base
            .join(path)
            .map_err(|e| DriverError::Permanent(format!("bad path {path}: {e}")))
    }

    fn net_err(e: reqwest::Error) -> DriverError {
        DriverError::TransientNetwork(e.to_string())
    }

    fn status_err(status: StatusCode, body: &str) -> DriverError {
        let detail = format!("{status}: {}", body.chars().take(200).collect::<String>());
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DriverError::AuthRequired(detail),
            StatusCode::NOT_FOUND => DriverError::NotFound(detail),
            StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT => DriverError::RemoteBusy(detail),
            _ => DriverError::Permanent(detail),
        }
    }

    async fn login(&self) -> Result<String, DriverError> {
        let url = self.url("/session")?;
        let resp = self
            .http
            .post(url)
            .json(&json!({ "username": self.username, "password": self.password }))
            .send()
            .await
            .map_err(Self::net_err)?;
        let status = resp.status();
        let body = resp.text().await.map_err(Self::net_err)?;
        if !status.is_success() {
            return Err(Self::status_err(status, &body));
        }
        let value: Value = serde_json::from_str(&body)
            .map_err(|e| DriverError::Permanent(format!("session response: {e}")))?;
        value
            .get("token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DriverError::Permanent("session response missing token".to_string()))
    }

    async fn token(&self) -> Result<String, DriverError> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            return Ok(token.clone());
        }
        let token = self.login().await?;
        *guard = Some(token.clone());
        Ok(token)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<(StatusCode, Vec<u8>), DriverError> {
        let token = self.token().await?;
        let mut request = self
            .http
            .request(method, self.url(path)?)
            .header("X-Cookie", format!("token={token}"));
        if let Some(body) = body {
            request = request.json(body);
        }
        let resp = request.send().await.map_err(Self::net_err)?;
        let status = resp.status();
        let bytes = resp.bytes().await.map_err(Self::net_err)?;
        Ok((status, bytes.to_vec()))
    }

    /// Authenticated request with one transparent re-login on 401/403.
    async fn request_bytes(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Vec<u8>, DriverError> {
        for relogin in [false, true] {
            if relogin {
                debug!(path, "session token rejected, re-authenticating");
                self.token.lock().await.take();
            }
            let (status, bytes) = self.send(method.clone(), path, body).await?;
            if status.is_success() {
                return Ok(bytes);
            }
            let err = Self::status_err(status, &String::from_utf8_lossy(&bytes));
            if !matches!(err, DriverError::AuthRequired(_)) || relogin {
                return Err(err);
            }
        }
        Err(DriverError::AuthRequired("re-login failed".to_string()))
    }

    async fn request_json(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, DriverError> {
        let bytes = self.request_bytes(method, path, body).await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| DriverError::Permanent(format!("response from {path}: {e}")))
    }

    /// Retry transient failures with exponential backoff.
    async fn with_retries<T, Fut>(
        &self,
        mut op: impl FnMut() -> Fut,
    ) -> Result<T, DriverError>
    where
        Fut: std::future::Future<Output = Result<T, DriverError>>,
    {
        let mut delay = RETRY_BASE_DELAY;
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                    warn!(error = %e, attempt, "transient scanner error, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Resolve the scan template once per driver ("advanced", falling back
    /// to the first template the scanner offers).
    async fn template(&self) -> Result<String, DriverError> {
        let mut guard = self.template_uuid.lock().await;
        if let Some(uuid) = guard.as_ref() {
            return Ok(uuid.clone());
        }
        let value = self
            .request_json(Method::GET, "/editor/scan/templates", None)
            .await?;
        let templates = value
            .get("templates")
            .and_then(Value::as_array)
            .ok_or_else(|| DriverError::Permanent("no scan templates".to_string()))?;
        let uuid = templates
            .iter()
            .find(|t| t.get("name").and_then(Value::as_str) == Some("advanced"))
            .or_else(|| templates.first())
            .and_then(|t| t.get("uuid"))
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::Permanent("template without uuid".to_string()))?;
        *guard = Some(uuid.to_string());
        Ok(uuid.to_string())
    }

    fn ssh_credential(credentials: &Credentials) -> Value {
        let elevate = credentials
            .escalation
            .as_ref()
            .map(|esc| esc.method)
            .map(|method| match method {
                EscalationMethod::Sudo => "sudo",
                EscalationMethod::Su => "su",
                EscalationMethod::SuSudo => "su+sudo",
                EscalationMethod::Pbrun => "pbrun",
                EscalationMethod::Dzdo => "dzdo",
            })
            .unwrap_or("Nothing");
        let mut ssh = match credentials.kind {
            CredentialKind::SshPassword => json!({
                "auth_method": "password",
                "username": credentials.username,
                "password": credentials.secret,
            }),
            CredentialKind::SshKey => json!({
                "auth_method": "public key",
                "username": credentials.username,
                "private_key": credentials.secret,
            }),
        };
        ssh["elevate_privileges_with"] = json!(elevate);
        if let Some(esc) = &credentials.escalation {
            if let Some(account) = &esc.account {
                ssh["escalation_account"] = json!(account);
            }
            if let Some(secret) = &esc.secret {
                ssh["escalation_password"] = json!(secret);
            }
        }
        ssh
    }

    fn create_body(template_uuid: &str, request: &ScanRequest) -> Value {
        let mut body = json!({
            "uuid": template_uuid,
            "settings": {
                "name": request.name,
                "description": request.description.clone().unwrap_or_default(),
                "text_targets": request.targets.join(","),
                "enabled": false,
            },
        });
        if let Some(credentials) = &request.credentials {
            body["credentials"] = json!({
                "add": { "Host": { "SSH": [Self::ssh_credential(credentials)] } }
            });
        }
        body
    }
}

#[async_trait]
impl ScannerDriver for NessusDriver {
    async fn create_scan(&self, request: &ScanRequest) -> Result<String, DriverError> {
        let template_uuid = self.with_retries(|| self.template()).await?;
        let body = Self::create_body(&template_uuid, request);
        let value = self
            .with_retries(|| self.request_json(Method::POST, "/scans", Some(&body)))
            .await?;
        value
            .get("scan")
            .and_then(|scan| scan.get("id"))
            .and_then(Value::as_i64)
            .map(|id| id.to_string())
            .ok_or_else(|| DriverError::Permanent("create response missing scan id".to_string()))
    }

    async fn launch_scan(&self, remote_scan_id: &str) -> Result<(), DriverError> {
        let path = format!("/scans/{remote_scan_id}/launch");
        self.with_retries(|| self.request_json(Method::POST, &path, None))
            .await?;
        Ok(())
    }

    async fn get_status(&self, remote_scan_id: &str) -> Result<RemoteStatus, DriverError> {
        let path = format!("/scans/{remote_scan_id}");
        let value = self
            .with_retries(|| self.request_json(Method::GET, &path, None))
            .await?;
        let info = value
            .get("info")
            .ok_or_else(|| DriverError::Permanent("scan details missing info".to_string()))?;
        let state = info
            .get("status")
            .and_then(Value::as_str)
            .map(RemoteScanState::parse)
            .ok_or_else(|| DriverError::Permanent("scan details missing status".to_string()))?;
        let progress = match state {
            RemoteScanState::Completed => 100,
            _ => info
                .get("progress")
                .and_then(Value::as_u64)
                .unwrap_or(0)
                .min(100) as u8,
        };
        Ok(RemoteStatus { state, progress })
    }

    async fn export_artifact(&self, remote_scan_id: &str) -> Result<Vec<u8>, DriverError> {
        let export_path = format!("/scans/{remote_scan_id}/export");
        let body = json!({ "format": "nessus" });
        let value = self
            .with_retries(|| self.request_json(Method::POST, &export_path, Some(&body)))
            .await?;
        let file_id = value
            .get("file")
            .and_then(Value::as_i64)
            .ok_or_else(|| DriverError::Permanent("export response missing file id".to_string()))?;

        let status_path = format!("/scans/{remote_scan_id}/export/{file_id}/status");
        let deadline = tokio::time::Instant::now() + EXPORT_TIMEOUT;
        loop {
            let value = self
                .with_retries(|| self.request_json(Method::GET, &status_path, None))
                .await?;
            if value.get("status").and_then(Value::as_str) == Some("ready") {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(DriverError::TransientNetwork(format!(
                    "export of scan {remote_scan_id} not ready after {}s",
                    EXPORT_TIMEOUT.as_secs()
                )));
            }
            tokio::time::sleep(EXPORT_POLL_INTERVAL).await;
        }

        let download_path = format!("/scans/{remote_scan_id}/export/{file_id}/download");
        self.with_retries(|| self.request_bytes(Method::GET, &download_path, None))
            .await
    }

    async fn stop_scan(&self, remote_scan_id: &str) -> Result<(), DriverError> {
        let path = format!("/scans/{remote_scan_id}/stop");
        self.request_json(Method::POST, &path, None).await?;
        Ok(())
    }

    async fn delete_scan(&self, remote_scan_id: &str) -> Result<(), DriverError> {
        let path = format!("/scans/{remote_scan_id}");
        self.request_json(Method::DELETE, &path, None).await?;
        Ok(())
    }
}

/// Caches one driver per instance so session tokens are reused across tasks.
#[derive(Default)]
pub struct NessusDriverFactory {
    drivers: Mutex<HashMap<String, Arc<NessusDriver>>>,
}

impl NessusDriverFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DriverFactory for NessusDriverFactory {
    fn driver_for(
        &self,
        kind: ScannerKind,
        instance: &InstanceConfig,
    ) -> Result<Arc<dyn ScannerDriver>, DriverError> {
        match kind {
            ScannerKind::Nessus => {}
        }
        let key = format!(
            "{}|{}|{}",
            instance.instance_id, instance.endpoint, instance.username
        );
        let mut drivers = self.drivers.lock();
        if let Some(driver) = drivers.get(&key) {
            return Ok(driver.clone());
        }
        let driver = Arc::new(NessusDriver::new(instance)?);
        drivers.insert(key, driver.clone());
        Ok(driver)
    }
}

#[cfg(test)]
#[path = "nessus_tests.rs"]
mod tests;
