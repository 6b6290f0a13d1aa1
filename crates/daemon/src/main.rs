// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! scanqd: scan orchestration daemon.
//!
//! Owns the task store, the work queues, and the scanner registry;
//! serves the tool-invocation surface on a unix socket and drives queued
//! scans on remote scanner instances.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use scanq_daemon::lifecycle::{self, init_tracing, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("scanqd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("scanqd {}", env!("CARGO_PKG_VERSION"));
                println!("Scan orchestration daemon: queues vulnerability scans and drives them on remote scanner instances");
                println!();
                println!("USAGE:");
                println!("    scanqd");
                println!();
                println!("Configuration is taken from SCANQ_* environment variables;");
                println!("see the repository README for the full list.");
                return Ok(());
            }
            other => {
                eprintln!("unknown argument: {other}");
                std::process::exit(2);
            }
        }
    }

    let config = Config::from_env()?;
    let _log_guard = init_tracing(config.log_dir.as_deref());
    lifecycle::run(config).await?;
    Ok(())
}
