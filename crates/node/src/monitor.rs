// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Liveness monitor: heartbeats out, silent peers out.

use crate::engine::{EngineInner, RoleState};
use jg_core::{Clock, GridEvent, NodeId, NodeInfo, NodeRole};
use std::io::Write;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Monitor activity: wakes every tick.
///
/// Each iteration: re-assert the fixed aggregator entry, evict silent
/// peers, heartbeat when due, then run the role's after-tick hook.
pub(crate) async fn monitor_loop<C: Clock>(inner: Arc<EngineInner<C>>) {
    let mut interval = tokio::time::interval(inner.config.timing.tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last_heartbeat: Option<Instant> = None;
    loop {
        tokio::select! {
            _ = inner.cancel.cancelled() => break,
            _ = interval.tick() => inner.monitor_tick(&mut last_heartbeat).await,
        }
    }
    debug!("monitor stopped");
}

impl<C: Clock> EngineInner<C> {
    async fn monitor_tick(&self, last_heartbeat: &mut Option<Instant>) {
        let now = self.clock.now();

        self.ensure_fixed_entries(now);

        // Evict silent peers; their jobs get rescheduled.
        let evicted = self.membership.lock().remove_expired(now, self.config.timing.grace);
        for node in evicted {
            info!(peer = %node.name, endpoint = %node.endpoint(), "peer timed out, evicting");
            if let RoleState::Coordinator(state) = &self.role {
                state.reschedule_lost(&node.id, now);
            }
            let _ = self.events.send(GridEvent::NodeRemoved { node });
        }

        // Registry heartbeat to everyone we know.
        let due = last_heartbeat
            .map_or(true, |at| now.saturating_duration_since(at) >= self.config.timing.heartbeat);
        if due {
            *last_heartbeat = Some(now);
            let msg = jg_wire::Message::new(jg_wire::Body::Control {
                command: jg_wire::ControlCommand::Registry,
                guid: None,
                result: None,
            })
            .with_sender(self.self_descriptor());
            self.send_to_all(&msg, None).await;
        }

        // Keepalive dot on an idle worker; purely cosmetic.
        if self.config.role == NodeRole::Worker && !self.busy.load(Ordering::Acquire) {
            print!(".");
            let _ = std::io::stdout().flush();
        }

        self.after_tick(now).await;
    }

    /// The aggregator's own entry (or, elsewhere, the configured
    /// aggregator's entry) is always present and never ages out.
    fn ensure_fixed_entries(&self, now: std::time::Instant) {
        let mut membership = self.membership.lock();
        match self.config.role {
            NodeRole::Aggregator => {
                let endpoint = self.self_endpoint();
                if !membership.contains(&endpoint) {
                    let info = self.self_info().with_fixed(true);
                    membership.upsert(info, now);
                }
                if let Some(entry) = membership.get_mut(&endpoint) {
                    entry.fixed = true;
                }
            }
            _ => {
                let Some(aggregator) = self.config.aggregator else {
                    return;
                };
                let endpoint = format!("{}:{}", aggregator.ip(), aggregator.port());
                if !membership.contains(&endpoint) {
                    let placeholder = NodeInfo::new(
                        NodeId::new(),
                        "aggregator",
                        aggregator.ip().to_string(),
                        aggregator.port(),
                        NodeRole::Aggregator,
                        &self.clock,
                    )
                    .with_fixed(true);
                    membership.upsert(placeholder, now);
                }
                if let Some(entry) = membership.get_mut(&endpoint) {
                    entry.fixed = true;
                }
            }
        }
    }

    /// Role-specific per-tick hook.
    async fn after_tick(&self, now: std::time::Instant) {
        match &self.role {
            RoleState::Aggregator(state) => self.aggregator_tick(state, now).await,
            RoleState::Worker(state) => {
                // Drain the local done-set; nothing upstream wants it.
                let drained = {
                    let mut done = state.done.lock();
                    std::mem::take(&mut *done)
                };
                for job in drained {
                    debug!(job_id = %job.id, "cleared finished job");
                }
            }
            RoleState::Coordinator(_) => {}
        }
    }
}
