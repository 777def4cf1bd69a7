// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node configuration and grid timing.

use crate::env;
use jg_core::NodeRole;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Every interval and deadline the engine uses.
///
/// Defaults are the grid's authoritative values; tests shrink them via
/// [`Timing::fast`].
#[derive(Debug, Clone)]
pub struct Timing {
    /// Monitor wake-up period.
    pub tick: Duration,
    /// Registry heartbeat period.
    pub heartbeat: Duration,
    /// Peer liveness grace since last-seen.
    pub grace: Duration,
    /// Dispatched-but-no-ack deadline before a job resets.
    pub dispatch_timeout: Duration,
    /// Running deadline before a job resets.
    pub running_timeout: Duration,
    /// Coordinator scheduling pass period.
    pub schedule_interval: Duration,
    /// Run-queue poll period on the worker execution activity.
    pub poll_interval: Duration,
    /// Delay before the single UDP send retry.
    pub send_retry_delay: Duration,
    /// Bound on joining the execution activity at stop.
    pub stop_join: Duration,
    /// Reply window for a remote JobQuery round trip.
    pub query_window: Duration,
    /// Resource rebroadcast period on the aggregator.
    pub resource_interval: Duration,
    /// Debounce after a node add/remove before rebroadcasting.
    pub resource_membership_delay: Duration,
    /// Debounce after a node update before rebroadcasting.
    pub resource_update_delay: Duration,
    /// Idle workers per Resource datagram.
    pub resource_batch: usize,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            heartbeat: Duration::from_secs(10),
            grace: Duration::from_secs(60),
            dispatch_timeout: Duration::from_secs(10),
            running_timeout: Duration::from_secs(3600),
            schedule_interval: Duration::from_millis(100),
            poll_interval: Duration::from_millis(100),
            send_retry_delay: Duration::from_millis(200),
            stop_join: Duration::from_secs(10),
            query_window: Duration::from_secs(3),
            resource_interval: Duration::from_secs(10),
            resource_membership_delay: Duration::from_millis(500),
            resource_update_delay: Duration::from_millis(1000),
            resource_batch: 10,
        }
    }
}

impl Timing {
    /// Compressed timing for tests: same machinery, sub-second deadlines.
    pub fn fast() -> Self {
        Self {
            tick: Duration::from_millis(50),
            heartbeat: Duration::from_millis(150),
            grace: Duration::from_millis(1500),
            dispatch_timeout: Duration::from_millis(700),
            running_timeout: Duration::from_secs(3600),
            schedule_interval: Duration::from_millis(25),
            poll_interval: Duration::from_millis(25),
            send_retry_delay: Duration::from_millis(50),
            stop_join: Duration::from_secs(5),
            query_window: Duration::from_secs(2),
            resource_interval: Duration::from_millis(300),
            resource_membership_delay: Duration::from_millis(50),
            resource_update_delay: Duration::from_millis(100),
            resource_batch: 10,
        }
    }
}

/// Identity and wiring of one node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub name: String,
    pub role: NodeRole,
    pub listen: SocketAddr,
    /// The aggregator to register with; the aggregator itself leaves this
    /// unset.
    pub aggregator: Option<SocketAddr>,
    pub processor_count: u32,
    /// Scratch area for wedge deployments.
    pub scratch_dir: PathBuf,
    pub timing: Timing,
}

impl NodeConfig {
    pub fn new(name: impl Into<String>, role: NodeRole, listen: SocketAddr) -> Self {
        Self {
            name: name.into(),
            role,
            listen,
            aggregator: None,
            processor_count: env::processor_count(),
            scratch_dir: env::scratch_dir(),
            timing: Timing::default(),
        }
    }

    pub fn with_aggregator(mut self, addr: SocketAddr) -> Self {
        self.aggregator = Some(addr);
        self
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }
}
