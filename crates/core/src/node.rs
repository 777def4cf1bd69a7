// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Peer descriptors and node roles.

use crate::clock::Clock;
use serde::{Deserialize, Serialize};
use std::time::Instant;

crate::define_id! {
    /// Unique identifier for a node.
    ///
    /// Locally generated at startup; peers learn it from the `guid`
    /// attribute of inbound messages. On the wire a peer is identified by
    /// `host:port`, the guid travels along.
    pub struct NodeId("node-");
}

/// Role a node plays in the grid.
///
/// Serialized with the wire names: the worker role is called `Execution`
/// on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    /// Runs jobs; at most one at a time.
    Worker,
    /// Registry and gossip hub.
    Aggregator,
    /// Accepts submissions and drives dispatch.
    Coordinator,
}

impl NodeRole {
    /// Wire name used in the `type` attribute.
    pub fn wire_name(&self) -> &'static str {
        match self {
            NodeRole::Worker => "Execution",
            NodeRole::Aggregator => "Aggregator",
            NodeRole::Coordinator => "Coordinator",
        }
    }

    /// Parse a wire `type` attribute value.
    pub fn from_wire_name(s: &str) -> Option<Self> {
        match s {
            "Execution" => Some(NodeRole::Worker),
            "Aggregator" => Some(NodeRole::Aggregator),
            "Coordinator" => Some(NodeRole::Coordinator),
            _ => None,
        }
    }
}

crate::simple_display! {
    NodeRole {
        Worker => "worker",
        Aggregator => "aggregator",
        Coordinator => "coordinator",
    }
}

/// One peer as seen from the local node.
///
/// Mutable soft state: the dispatcher refreshes `last_seen` on every
/// addressed message, the scheduler reads `busy`/`completed_jobs` when
/// picking dispatch targets.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub id: NodeId,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub role: NodeRole,
    /// Capability hint, not a scheduling constraint.
    pub processor_count: u32,
    pub busy: bool,
    /// Suppresses timeout eviction (the aggregator entry, or self).
    pub fixed: bool,
    pub last_seen: Instant,
    pub free_since: Instant,
    pub completed_jobs: u32,
    /// Task name of the last job this peer completed; affinity hint.
    pub last_task: Option<String>,
}

impl NodeInfo {
    pub fn new(
        id: NodeId,
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        role: NodeRole,
        clock: &impl Clock,
    ) -> Self {
        let now = clock.now();
        Self {
            id,
            name: name.into(),
            host: host.into(),
            port,
            role,
            processor_count: 1,
            busy: false,
            fixed: false,
            last_seen: now,
            free_since: now,
            completed_jobs: 0,
            last_task: None,
        }
    }

    /// Identity key on the wire and in the membership table.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Eligible dispatch target: a non-busy worker.
    pub fn is_idle_worker(&self) -> bool {
        self.role == NodeRole::Worker && !self.busy
    }

    pub fn with_fixed(mut self, fixed: bool) -> Self {
        self.fixed = fixed;
        self
    }

    pub fn with_processor_count(mut self, count: u32) -> Self {
        self.processor_count = count;
        self
    }

    /// Age since this peer was last heard from.
    pub fn last_seen_age(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(self.last_seen)
    }
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod tests;
