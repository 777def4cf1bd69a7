// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Internal event vocabulary.
//!
//! Events are published on a broadcast channel inside each node so that
//! independent consumers (the coordinator's rescheduler, the aggregator's
//! broadcast trigger, log observers) see membership and traffic changes
//! without sharing callbacks.

use crate::job::JobId;
use crate::node::NodeInfo;
use serde::{Deserialize, Serialize};

/// Severity of an upward-forwarded report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportLevel {
    Info,
    Error,
}

crate::simple_display! {
    ReportLevel {
        Info => "info",
        Error => "error",
    }
}

/// Job counts returned by a remote query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub running: u32,
    pub dispatched: u32,
    pub non_scheduled: u32,
}

impl JobCounts {
    pub fn total(&self) -> u32 {
        self.running + self.dispatched + self.non_scheduled
    }
}

/// Events that observers of a node can subscribe to.
#[derive(Debug, Clone)]
pub enum GridEvent {
    /// A peer registered for the first time.
    NodeAdded { node: NodeInfo },
    /// A known peer changed role, name, or busy state.
    NodeUpdated { node: NodeInfo },
    /// A peer aged out or was blocked.
    NodeRemoved { node: NodeInfo },
    /// A datagram went out.
    MessageSent { to: String, kind: &'static str },
    /// A datagram was decoded successfully.
    MessageReceived { from: String, kind: &'static str },
    /// A Report message arrived from a peer.
    Report { level: ReportLevel, from: String, text: String },
    /// A job finished and was drained from the done-set.
    JobDone { job_id: JobId, task_name: String },
    /// A JobStatus reply arrived for an outstanding query.
    QueryReply { counts: JobCounts },
}
