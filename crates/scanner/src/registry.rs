// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory catalog of scanner instances grouped by pool.
//!
//! `in_flight` counters are process-local and never persisted; acquisition
//! is serialized under the registry write lock so the per-instance bound
//! holds. Hot reload swaps the instance set while carrying counters for
//! surviving instances.

use crate::config::{InstanceConfig, PoolMap};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown scanner pool: {0}")]
    UnknownPool(String),
    #[error("unknown scanner instance {instance} in pool {pool}")]
    UnknownInstance { pool: String, instance: String },
    #[error("no scanner capacity in pool {0}")]
    NoCapacity(String),
    #[error("no scanner pools configured")]
    NoPools,
}

/// Scanner kind, derived from the pool name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScannerKind {
    Nessus,
}

impl ScannerKind {
    /// `nessus*` pools run Nessus scanners. Unrecognized prefixes have no
    /// driver and cannot accept work.
    pub fn from_pool(pool: &str) -> Option<Self> {
        if pool.starts_with("nessus") {
            Some(ScannerKind::Nessus)
        } else {
            None
        }
    }

    /// Prefix used in task IDs minted for this scanner kind.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            ScannerKind::Nessus => "nessus",
        }
    }
}

struct InstanceState {
    config: InstanceConfig,
    in_flight: u32,
    last_acquired_ms: u64,
}

impl InstanceState {
    fn has_capacity(&self) -> bool {
        self.config.enabled && self.in_flight < self.config.max_concurrent
    }
}

/// A successful acquisition: the instance config plus the pool it came from.
/// The caller owns one slot until it calls [`ScannerRegistry::release`].
#[derive(Debug, Clone)]
pub struct AcquiredInstance {
    pub pool: String,
    pub kind: ScannerKind,
    pub config: InstanceConfig,
}

/// Point-in-time view of one instance, safe to serialize (no secrets).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceSnapshot {
    pub instance_id: String,
    pub name: String,
    pub endpoint: String,
    pub enabled: bool,
    pub max_concurrent: u32,
    pub in_flight: u32,
}

/// Aggregate view of one pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStatus {
    pub pool: String,
    pub scanner_count: usize,
    pub max_concurrent_total: u32,
    pub in_flight_total: u32,
    pub utilization_pct: f64,
    pub instances: Vec<InstanceSnapshot>,
}

/// Load-balanced scanner instance registry.
pub struct ScannerRegistry {
    pools: RwLock<IndexMap<String, Vec<InstanceState>>>,
}

impl ScannerRegistry {
    pub fn new(pool_map: PoolMap) -> Self {
        Self {
            pools: RwLock::new(Self::build(pool_map, &IndexMap::new())),
        }
    }

    fn build(
        pool_map: PoolMap,
        carry: &IndexMap<(String, String), (u32, u64)>,
    ) -> IndexMap<String, Vec<InstanceState>> {
        pool_map
            .into_iter()
            .map(|(pool, instances)| {
                let states = instances
                    .into_iter()
                    .map(|config| {
                        let key = (pool.clone(), config.instance_id.clone());
                        let (in_flight, last_acquired_ms) =
                            carry.get(&key).copied().unwrap_or((0, 0));
                        InstanceState {
                            config,
                            in_flight,
                            last_acquired_ms,
                        }
                    })
                    .collect();
                (pool, states)
            })
            .collect()
    }

    /// Replace the instance set, preserving in-flight counters for
    /// instances that survive the reload.
    pub fn reload(&self, pool_map: PoolMap) {
        let mut pools = self.pools.write();
        let carry: IndexMap<(String, String), (u32, u64)> = pools
            .iter()
            .flat_map(|(pool, states)| {
                states.iter().map(|s| {
                    (
                        (pool.clone(), s.config.instance_id.clone()),
                        (s.in_flight, s.last_acquired_ms),
                    )
                })
            })
            .collect();
        *pools = Self::build(pool_map, &carry);
        info!(pools = pools.len(), "scanner registry reloaded");
    }

    pub fn list_pools(&self) -> Vec<String> {
        self.pools.read().keys().cloned().collect()
    }

    /// The first declared pool.
    pub fn default_pool(&self) -> Result<String, RegistryError> {
        self.pools
            .read()
            .keys()
            .next()
            .cloned()
            .ok_or(RegistryError::NoPools)
    }

    pub fn has_pool(&self, pool: &str) -> bool {
        self.pools.read().contains_key(pool)
    }

    /// Submission-time candidate: the least-utilized enabled instance,
    /// recorded on the task but not reserved.
    pub fn candidate(&self, pool: &str) -> Result<InstanceConfig, RegistryError> {
        let pools = self.pools.read();
        let states = pools
            .get(pool)
            .ok_or_else(|| RegistryError::UnknownPool(pool.to_string()))?;
        states
            .iter()
            .filter(|s| s.config.enabled)
            .min_by(|a, b| cmp_utilization(a, b))
            .map(|s| s.config.clone())
            .ok_or_else(|| RegistryError::NoCapacity(pool.to_string()))
    }

    /// Reserve a slot on the least-utilized enabled instance with spare
    /// capacity (ties broken least-recently-acquired). With
    /// `explicit_instance`, only that instance is considered.
    pub fn acquire(
        &self,
        pool: &str,
        explicit_instance: Option<&str>,
        now_ms: u64,
    ) -> Result<AcquiredInstance, RegistryError> {
        let kind = ScannerKind::from_pool(pool)
            .ok_or_else(|| RegistryError::UnknownPool(pool.to_string()))?;
        let mut pools = self.pools.write();
        let states = pools
            .get_mut(pool)
            .ok_or_else(|| RegistryError::UnknownPool(pool.to_string()))?;

        if let Some(wanted) = explicit_instance {
            if !states.iter().any(|s| s.config.instance_id == wanted) {
                return Err(RegistryError::UnknownInstance {
                    pool: pool.to_string(),
                    instance: wanted.to_string(),
                });
            }
        }

        let chosen = states
            .iter_mut()
            .filter(|s| {
                explicit_instance
                    .map(|wanted| s.config.instance_id == wanted)
                    .unwrap_or(true)
            })
            .filter(|s| s.has_capacity())
            .min_by(|a, b| cmp_utilization(a, b));

        let Some(state) = chosen else {
            return Err(RegistryError::NoCapacity(pool.to_string()));
        };
        state.in_flight += 1;
        state.last_acquired_ms = now_ms;
        Ok(AcquiredInstance {
            pool: pool.to_string(),
            kind,
            config: state.config.clone(),
        })
    }

    /// Return a slot. Idempotent on over-release: the counter clamps at
    /// zero with a warning.
    pub fn release(&self, pool: &str, instance_id: &str) {
        let mut pools = self.pools.write();
        let Some(state) = pools
            .get_mut(pool)
            .and_then(|states| states.iter_mut().find(|s| s.config.instance_id == instance_id))
        else {
            // Instance removed by a reload while its scan was in flight.
            return;
        };
        if state.in_flight == 0 {
            warn!(pool, instance_id, "release with zero in-flight count");
            return;
        }
        state.in_flight -= 1;
    }

    pub fn pool_status(&self, pool: &str) -> Result<PoolStatus, RegistryError> {
        let pools = self.pools.read();
        let states = pools
            .get(pool)
            .ok_or_else(|| RegistryError::UnknownPool(pool.to_string()))?;
        Ok(Self::status_of(pool, states))
    }

    pub fn all_pool_status(&self) -> Vec<PoolStatus> {
        let pools = self.pools.read();
        pools
            .iter()
            .map(|(pool, states)| Self::status_of(pool, states))
            .collect()
    }

    pub fn instances(&self, pool: &str) -> Result<Vec<InstanceSnapshot>, RegistryError> {
        Ok(self.pool_status(pool)?.instances)
    }

    fn status_of(pool: &str, states: &[InstanceState]) -> PoolStatus {
        let max_concurrent_total: u32 = states.iter().map(|s| s.config.max_concurrent).sum();
        let in_flight_total: u32 = states.iter().map(|s| s.in_flight).sum();
        let utilization_pct = if max_concurrent_total == 0 {
            0.0
        } else {
            (in_flight_total as f64 / max_concurrent_total as f64 * 1000.0).round() / 10.0
        };
        PoolStatus {
            pool: pool.to_string(),
            scanner_count: states.len(),
            max_concurrent_total,
            in_flight_total,
            utilization_pct,
            instances: states
                .iter()
                .map(|s| InstanceSnapshot {
                    instance_id: s.config.instance_id.clone(),
                    name: s.config.name.clone(),
                    endpoint: s.config.endpoint.clone(),
                    enabled: s.config.enabled,
                    max_concurrent: s.config.max_concurrent,
                    in_flight: s.in_flight,
                })
                .collect(),
        }
    }
}

/// Order by utilization ratio (cross-multiplied to stay in integers), then
/// least-recently-acquired.
fn cmp_utilization(a: &InstanceState, b: &InstanceState) -> std::cmp::Ordering {
    let lhs = a.in_flight as u64 * b.config.max_concurrent.max(1) as u64;
    let rhs = b.in_flight as u64 * a.config.max_concurrent.max(1) as u64;
    lhs.cmp(&rhs)
        .then(a.last_acquired_ms.cmp(&b.last_acquired_ms))
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
