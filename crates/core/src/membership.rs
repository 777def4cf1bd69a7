// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Soft-state membership table.
//!
//! Keyed by `host:port` — the identity of a peer on the wire. Entries are
//! created on first receipt of any addressed message (implicit
//! registration) and destroyed by the aging sweep or an explicit block.
//! Entries with `fixed=true` (the aggregator, or self) never age out.

use crate::node::{NodeId, NodeInfo};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// What an upsert did to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    /// New entry created.
    Added,
    /// Existing entry changed role, name, or busy state.
    Updated,
    /// Existing entry only had its last-seen refreshed.
    Refreshed,
    /// Sender is blocked; table untouched.
    Blocked,
}

/// Membership table plus the blocked-id set.
#[derive(Debug, Default)]
pub struct Membership {
    nodes: HashMap<String, NodeInfo>,
    blocked: HashSet<NodeId>,
}

impl Membership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a peer, keyed by its endpoint.
    ///
    /// Re-registration of a known peer is idempotent: the entry's identity
    /// and local bookkeeping (completed count, fixed flag) survive, the
    /// wire-carried fields and `last_seen` are refreshed. A blocked guid is
    /// ignored entirely.
    pub fn upsert(&mut self, incoming: NodeInfo, now: Instant) -> MembershipChange {
        if self.blocked.contains(&incoming.id) {
            return MembershipChange::Blocked;
        }
        match self.nodes.get_mut(&incoming.endpoint()) {
            Some(entry) => {
                let changed = entry.role != incoming.role
                    || entry.name != incoming.name
                    || entry.busy != incoming.busy;
                if entry.busy && !incoming.busy {
                    entry.free_since = now;
                }
                entry.id = incoming.id;
                entry.name = incoming.name;
                entry.role = incoming.role;
                entry.busy = incoming.busy;
                entry.processor_count = incoming.processor_count;
                if incoming.last_task.is_some() {
                    entry.last_task = incoming.last_task;
                }
                entry.last_seen = now;
                if changed {
                    MembershipChange::Updated
                } else {
                    MembershipChange::Refreshed
                }
            }
            None => {
                let mut entry = incoming;
                entry.last_seen = now;
                self.nodes.insert(entry.endpoint(), entry);
                MembershipChange::Added
            }
        }
    }

    pub fn get(&self, endpoint: &str) -> Option<&NodeInfo> {
        self.nodes.get(endpoint)
    }

    pub fn get_mut(&mut self, endpoint: &str) -> Option<&mut NodeInfo> {
        self.nodes.get_mut(endpoint)
    }

    pub fn find_by_id(&self, id: &NodeId) -> Option<&NodeInfo> {
        self.nodes.values().find(|n| &n.id == id)
    }

    pub fn contains(&self, endpoint: &str) -> bool {
        self.nodes.contains_key(endpoint)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeInfo> {
        self.nodes.values()
    }

    /// Remove every non-fixed peer not heard from within `grace`.
    ///
    /// Returns the evicted entries so the caller can fire removal events
    /// and reschedule orphaned jobs.
    pub fn remove_expired(&mut self, now: Instant, grace: Duration) -> Vec<NodeInfo> {
        let expired: Vec<String> = self
            .nodes
            .values()
            .filter(|n| !n.fixed && n.last_seen_age(now) > grace)
            .map(|n| n.endpoint())
            .collect();
        expired.into_iter().filter_map(|ep| self.nodes.remove(&ep)).collect()
    }

    /// Block a guid and drop its membership entry, if any.
    ///
    /// Blocking twice is equivalent to blocking once.
    pub fn block(&mut self, id: &NodeId) -> Option<NodeInfo> {
        self.blocked.insert(id.clone());
        let endpoint = self.find_by_id(id).map(|n| n.endpoint());
        endpoint.and_then(|ep| self.nodes.remove(&ep))
    }

    pub fn unblock(&mut self, id: &NodeId) {
        self.blocked.remove(id);
    }

    pub fn is_blocked(&self, id: &NodeId) -> bool {
        self.blocked.contains(id)
    }

    /// Non-busy workers, the aggregator's broadcast payload.
    pub fn idle_workers(&self) -> Vec<NodeInfo> {
        self.nodes.values().filter(|n| n.is_idle_worker()).cloned().collect()
    }

    /// Flip the busy flag in the local view (set at dispatch, cleared on
    /// completion).
    pub fn set_busy(&mut self, id: &NodeId, busy: bool, now: Instant) {
        if let Some(entry) = self.nodes.values_mut().find(|n| &n.id == id) {
            if entry.busy && !busy {
                entry.free_since = now;
            }
            entry.busy = busy;
        }
    }

    /// Credit a completed job to a worker: bumps the completed count,
    /// records the task for affinity, and frees the busy flag.
    pub fn record_completion(&mut self, id: &NodeId, task_name: &str, now: Instant) {
        if let Some(entry) = self.nodes.values_mut().find(|n| &n.id == id) {
            entry.completed_jobs += 1;
            if !task_name.is_empty() {
                entry.last_task = Some(task_name.to_string());
            }
            entry.busy = false;
            entry.free_since = now;
        }
    }
}

#[cfg(test)]
#[path = "membership_tests.rs"]
mod tests;
