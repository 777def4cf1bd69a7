// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared spec harness: node launchers, scripts, polling helpers.

#![allow(dead_code)]

pub use jg::GridClient;
pub use jg_core::{GridEvent, JobCounts, NodeRole};
pub use jg_node::{Engine, NodeConfig, Timing};
pub use std::net::SocketAddr;
pub use std::path::{Path, PathBuf};
pub use std::time::Duration;

use std::os::unix::fs::PermissionsExt;

pub const LOOPBACK_ANY: &str = "127.0.0.1:0";

fn listen_any() -> SocketAddr {
    match LOOPBACK_ANY.parse() {
        Ok(addr) => addr,
        Err(_) => unreachable!("loopback literal"),
    }
}

pub async fn start_aggregator() -> Engine {
    let config =
        NodeConfig::new("agg", NodeRole::Aggregator, listen_any()).with_timing(Timing::fast());
    Engine::start(config).await.expect("start aggregator")
}

pub async fn start_coordinator(name: &str, aggregator: SocketAddr) -> Engine {
    let config = NodeConfig::new(name, NodeRole::Coordinator, listen_any())
        .with_aggregator(aggregator)
        .with_timing(Timing::fast());
    Engine::start(config).await.expect("start coordinator")
}

pub async fn start_worker(name: &str, aggregator: SocketAddr, scratch: &Path) -> Engine {
    let config = NodeConfig::new(name, NodeRole::Worker, listen_any())
        .with_aggregator(aggregator)
        .with_timing(Timing::fast())
        .with_scratch_dir(scratch);
    Engine::start(config).await.expect("start worker")
}

/// Write an executable shell script into `dir`.
pub fn sh_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod script");
    path
}

/// Poll `check` until it returns true or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Wait for a `JobDone` event on a node's event stream.
pub async fn wait_for_job_done(
    events: &mut tokio::sync::broadcast::Receiver<GridEvent>,
    timeout: Duration,
) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match tokio::time::timeout_at(deadline, events.recv()).await {
            Ok(Ok(GridEvent::JobDone { .. })) => return true,
            Ok(Ok(_)) => continue,
            Ok(Err(tokio::sync::broadcast::error::RecvError::Lagged(_))) => continue,
            _ => return false,
        }
    }
}

/// Endpoint string for a started engine.
pub fn endpoint(engine: &Engine) -> String {
    engine.local_addr().to_string()
}
