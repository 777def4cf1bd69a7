// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Aggregator resource broadcasting.
//!
//! The aggregator pushes its view of idle workers to every coordinator:
//! on a 10 s cadence, or sooner after a membership change settles. The
//! trigger consumes membership events from the node's internal channel,
//! independent of the monitor that produced them.

use crate::config::Timing;
use crate::engine::EngineInner;
use jg_core::{Clock, GridEvent, NodeInfo};
use jg_wire::{Body, Message, NodeDescriptor};
use parking_lot::Mutex;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// What kind of change is waiting to be announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum PendingChange {
    /// Role/name/busy change; longest debounce.
    Update,
    /// Node added or removed; short debounce.
    Membership,
}

/// Decides when a Resource broadcast is due.
#[derive(Debug)]
pub(crate) struct BroadcastTrigger {
    last_broadcast: Option<Instant>,
    pending: Option<(PendingChange, Instant)>,
}

impl BroadcastTrigger {
    pub(crate) fn new() -> Self {
        Self { last_broadcast: None, pending: None }
    }

    /// Note a membership change; keeps the earliest timestamp and the
    /// stronger change kind.
    pub(crate) fn note(&mut self, change: PendingChange, now: Instant) {
        self.pending = Some(match self.pending.take() {
            None => (change, now),
            Some((kind, at)) => (kind.max(change), at),
        });
    }

    pub(crate) fn should_broadcast(&self, now: Instant, timing: &Timing) -> bool {
        let interval_due = match self.last_broadcast {
            None => true,
            Some(at) => now.saturating_duration_since(at) >= timing.resource_interval,
        };
        if interval_due {
            return true;
        }
        match self.pending {
            Some((PendingChange::Membership, at)) => {
                now.saturating_duration_since(at) >= timing.resource_membership_delay
            }
            Some((PendingChange::Update, at)) => {
                now.saturating_duration_since(at) >= timing.resource_update_delay
            }
            None => false,
        }
    }

    pub(crate) fn mark_broadcast(&mut self, now: Instant) {
        self.last_broadcast = Some(now);
        self.pending = None;
    }
}

pub(crate) struct AggregatorState {
    pub(crate) events: Mutex<broadcast::Receiver<GridEvent>>,
    pub(crate) trigger: Mutex<BroadcastTrigger>,
}

impl AggregatorState {
    pub(crate) fn new(events: broadcast::Receiver<GridEvent>) -> Self {
        Self { events: Mutex::new(events), trigger: Mutex::new(BroadcastTrigger::new()) }
    }

    /// Drain queued membership events into the trigger.
    fn absorb_events(&self, now: Instant) {
        let mut events = self.events.lock();
        let mut trigger = self.trigger.lock();
        loop {
            match events.try_recv() {
                Ok(GridEvent::NodeAdded { .. }) | Ok(GridEvent::NodeRemoved { .. }) => {
                    trigger.note(PendingChange::Membership, now);
                }
                Ok(GridEvent::NodeUpdated { .. }) => {
                    trigger.note(PendingChange::Update, now);
                }
                Ok(_) => {}
                // Missed events: assume the worst and rebroadcast soon.
                Err(broadcast::error::TryRecvError::Lagged(_)) => {
                    trigger.note(PendingChange::Membership, now);
                }
                Err(_) => break,
            }
        }
    }
}

impl<C: Clock> EngineInner<C> {
    pub(crate) async fn aggregator_tick(&self, state: &AggregatorState, now: Instant) {
        state.absorb_events(now);

        let due = state.trigger.lock().should_broadcast(now, &self.config.timing);
        if !due {
            return;
        }

        let idle: Vec<NodeInfo> = self.membership.lock().idle_workers();
        state.trigger.lock().mark_broadcast(now);
        if idle.is_empty() {
            debug!("no idle workers to broadcast");
            return;
        }

        info!(idle = idle.len(), "broadcasting resources");
        for batch in idle.chunks(self.config.timing.resource_batch) {
            let nodes: Vec<NodeDescriptor> = batch.iter().map(NodeDescriptor::from_info).collect();
            let msg = Message::new(Body::Resource { nodes });
            self.send_to_all(&msg, Some(jg_core::NodeRole::Coordinator)).await;
        }
    }
}

#[cfg(test)]
#[path = "aggregator_tests.rs"]
mod tests;
