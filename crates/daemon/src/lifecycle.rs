// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: configuration, startup, signals, graceful shutdown.

use crate::env;
use crate::listener::{self, AppContext};
use fs2::FileExt;
use scanq_core::{Clock, SystemClock};
use scanq_engine::{housekeeper, HousekeeperConfig, Worker, WorkerConfig};
use scanq_queue::{QueueError, RedisQueue};
use scanq_scanner::{load_pool_map, ConfigError, NessusDriverFactory, ScannerRegistry};
use scanq_store::{recover_stale_running, StoreError, TaskStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot resolve data directory (set SCANQ_DATA_DIR or HOME)")]
    NoDataDir,
    #[error("another scanqd owns {0} (remove the lock only if that daemon is gone)")]
    AlreadyRunning(PathBuf),
    #[error("scanner registry file not found: {0}")]
    MissingScannersFile(PathBuf),
}

/// Resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub redis_url: String,
    pub scanners_file: PathBuf,
    pub socket_path: PathBuf,
    pub worker: WorkerConfig,
    pub housekeeper: HousekeeperConfig,
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, LifecycleError> {
        let data_dir = env::data_dir()?;
        let task_deadline = env::task_deadline();
        let worker = WorkerConfig {
            pools: env::worker_pools(),
            poll_interval: env::poll_interval(),
            task_deadline,
            max_concurrent_scans: env::max_concurrent_scans(),
            ..WorkerConfig::default()
        };
        let housekeeper = HousekeeperConfig {
            retention: env::retention(),
            task_deadline,
            ..HousekeeperConfig::default()
        };
        Ok(Self {
            redis_url: env::redis_url(),
            scanners_file: env::scanners_file(&data_dir),
            socket_path: env::socket_path(&data_dir),
            worker,
            housekeeper,
            log_dir: env::log_dir(),
            data_dir,
        })
    }
}

/// Install the tracing subscriber. With a log dir, writes daily-rotated
/// files through a non-blocking appender (hold the guard until exit).
pub fn init_tracing(
    log_dir: Option<&Path>,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "scanqd.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

/// Run the daemon to completion: lock the data root, wire the components,
/// serve until a shutdown signal, then drain.
pub async fn run(config: Config) -> Result<(), LifecycleError> {
    std::fs::create_dir_all(&config.data_dir)?;
    let lock_path = config.data_dir.join("scanqd.lock");
    let lock_file = std::fs::File::create(&lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(|_| LifecycleError::AlreadyRunning(lock_path.clone()))?;

    if !config.scanners_file.exists() {
        return Err(LifecycleError::MissingScannersFile(
            config.scanners_file.clone(),
        ));
    }
    let registry = Arc::new(ScannerRegistry::new(load_pool_map(&config.scanners_file)?));
    let store = Arc::new(TaskStore::open(config.data_dir.join("tasks"))?);
    let queue = Arc::new(RedisQueue::connect(&config.redis_url).await?);
    let clock = SystemClock;

    // Crash recovery: RUNNING tasks older than the deadline are leftovers
    // from a previous daemon.
    let deadline = chrono::Duration::from_std(config.worker.task_deadline)
        .unwrap_or_else(|_| chrono::Duration::hours(24));
    let recovered = recover_stale_running(&store, clock.now_utc(), deadline)?;
    if !recovered.is_empty() {
        info!(count = recovered.len(), "recovered stale RUNNING tasks");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);

    let worker = Worker::new(
        store.clone(),
        queue.clone(),
        registry.clone(),
        Arc::new(NessusDriverFactory::new()),
        clock,
        config.worker.clone(),
        shutdown_rx.clone(),
    );
    let worker_handle = tokio::spawn(worker.run());
    let housekeeper_handle = tokio::spawn(housekeeper::run(
        store.clone(),
        clock,
        config.housekeeper.clone(),
        shutdown_rx.clone(),
    ));

    let ctx = Arc::new(AppContext {
        store,
        queue,
        registry: registry.clone(),
        clock,
        scanners_file: Some(config.scanners_file.clone()),
        started_at_ms: clock.epoch_ms(),
        shutdown: shutdown_tx.clone(),
    });
    let listener_handle = tokio::spawn(listener::serve(
        config.socket_path.clone(),
        ctx,
        shutdown_rx.clone(),
    ));
    info!(
        data_dir = %config.data_dir.display(),
        pools = registry.list_pools().len(),
        "scanqd started"
    );

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;
    let mut shutdown_watch = shutdown_rx.clone();
    loop {
        tokio::select! {
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down");
                break;
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down");
                break;
            }
            _ = sighup.recv() => {
                // Hot reload: swap the instance set, keep in-flight counts.
                match load_pool_map(&config.scanners_file) {
                    Ok(pool_map) => {
                        registry.reload(pool_map);
                        info!("scanner registry reloaded on SIGHUP");
                    }
                    Err(e) => warn!(error = %e, "SIGHUP reload failed, keeping old registry"),
                }
            }
            _ = shutdown_watch.wait_for(|stop| *stop) => break,
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = worker_handle.await;
    let _ = housekeeper_handle.await;
    let _ = listener_handle.await;
    let _ = FileExt::unlock(&lock_file);
    info!("scanqd stopped");
    Ok(())
}
