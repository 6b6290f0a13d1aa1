// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! scanq-scanner: remote scanner drivers and the in-memory scanner registry.
//!
//! A driver adapts one remote scanner kind to the capability set the worker
//! consumes (create, launch, poll, export, stop, delete). The registry is
//! the load-balanced catalog of scanner instances grouped by pool, tracking
//! per-instance in-flight counts against a concurrency bound.

pub mod config;
pub mod driver;
#[cfg(any(test, feature = "test-support"))]
pub mod fake;
pub mod nessus;
pub mod registry;

pub use config::{interpolate_env, load_pool_map, ConfigError, InstanceConfig, PoolMap};
pub use driver::{
    map_remote_state, DriverError, DriverFactory, MappedState, RemoteScanState, RemoteStatus,
    ScanRequest, ScannerDriver,
};
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeDriverFactory, FakeScannerDriver};
pub use nessus::{NessusDriver, NessusDriverFactory};
pub use registry::{
    AcquiredInstance, InstanceSnapshot, PoolStatus, RegistryError, ScannerKind, ScannerRegistry,
};
