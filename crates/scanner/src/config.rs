// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry configuration: a YAML pool map with environment interpolation.
//!
//! ```yaml
//! nessus:
//!   - instance_id: scanner-01
//!     name: Primary scanner
//!     endpoint: https://nessus-01.internal:8834
//!     username: ${NESSUS_USER}
//!     password: ${NESSUS_PASS}
//!     max_concurrent: 4
//! ```

use indexmap::IndexMap;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Pool name -> declared instances, in file order.
pub type PoolMap = IndexMap<String, Vec<InstanceConfig>>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("environment variable not set: {0}")]
    MissingEnv(String),
    #[error("unterminated ${{...}} interpolation")]
    UnterminatedInterpolation,
    #[error("pool {0} declares no instances")]
    EmptyPool(String),
    #[error("duplicate instance id {1} in pool {0}")]
    DuplicateInstance(String, String),
}

/// One remote scanner endpoint.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct InstanceConfig {
    pub instance_id: String,
    pub name: String,
    pub endpoint: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_max_concurrent() -> u32 {
    2
}

fn default_enabled() -> bool {
    true
}

impl fmt::Debug for InstanceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceConfig")
            .field("instance_id", &self.instance_id)
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("max_concurrent", &self.max_concurrent)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Substitute `${NAME}` and `${NAME:-default}` from the environment.
pub fn interpolate_env(input: &str) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(ConfigError::UnterminatedInterpolation);
        };
        let expr = &after[..end];
        let (name, default) = match expr.split_once(":-") {
            Some((name, default)) => (name, Some(default)),
            None => (expr, None),
        };
        match std::env::var(name) {
            Ok(value) => out.push_str(&value),
            Err(_) => match default {
                Some(default) => out.push_str(default),
                None => return Err(ConfigError::MissingEnv(name.to_string())),
            },
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Load and validate the pool map from a YAML file.
pub fn load_pool_map(path: &Path) -> Result<PoolMap, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    parse_pool_map(&raw)
}

/// Parse a pool map from YAML text (after env interpolation).
pub fn parse_pool_map(raw: &str) -> Result<PoolMap, ConfigError> {
    let interpolated = interpolate_env(raw)?;
    let pools: PoolMap = serde_yaml::from_str(&interpolated)?;
    for (pool, instances) in &pools {
        if instances.is_empty() {
            return Err(ConfigError::EmptyPool(pool.clone()));
        }
        let mut seen = std::collections::HashSet::new();
        for instance in instances {
            if !seen.insert(instance.instance_id.as_str()) {
                return Err(ConfigError::DuplicateInstance(
                    pool.clone(),
                    instance.instance_id.clone(),
                ));
            }
        }
    }
    Ok(pools)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
