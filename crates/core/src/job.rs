// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identity and state machine.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};

crate::define_id! {
    /// Unique identifier for a job.
    ///
    /// Created at submission, carried on the wire as the `guid` attribute,
    /// and used by the coordinator to converge acknowledgements onto the
    /// owning entry.
    pub struct JobId("job-");
}

/// Where a job is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for the coordinator to pick a worker.
    Unscheduled,
    /// Sent to a worker, acknowledgement pending.
    Dispatched,
    /// A worker acknowledged and is running it.
    RemoteRunning,
    /// In the local run queue of this node.
    LocalRunning,
    /// Finished, awaiting cleanup.
    Done,
}

crate::simple_display! {
    JobStatus {
        Unscheduled => "unscheduled",
        Dispatched => "dispatched",
        RemoteRunning => "remote-running",
        LocalRunning => "local-running",
        Done => "done",
    }
}

/// A unit of work.
///
/// Owned by the coordinator that accepted it; referenced (but not owned)
/// by the worker executing it. Transferred by value over the wire and
/// destroyed only when acknowledged done.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    /// Groups related jobs; drives the dispatch affinity heuristic.
    pub task_name: String,
    /// Selects the executor on the worker side.
    pub wedge_name: String,
    pub command: String,
    pub arguments: String,
    /// When set, existence of this path after execution is the
    /// authoritative success signal.
    pub done_file: Option<PathBuf>,
    /// Reply endpoint of the owning coordinator (set on the worker side).
    pub coordinator: Option<String>,
    /// Worker currently holding the job; cleared on reschedule.
    pub running_node: Option<NodeId>,
    pub status: JobStatus,
    pub status_changed_at: Instant,
}

/// Wedge name used when a submission does not pick one.
pub const DEFAULT_WEDGE: &str = "command-line";

impl Job {
    pub fn new(command: impl Into<String>, arguments: impl Into<String>, now: Instant) -> Self {
        let id = JobId::new();
        Self {
            name: id.as_str().to_string(),
            id,
            task_name: String::new(),
            wedge_name: DEFAULT_WEDGE.to_string(),
            command: command.into(),
            arguments: arguments.into(),
            done_file: None,
            coordinator: None,
            running_node: None,
            status: JobStatus::Unscheduled,
            status_changed_at: now,
        }
    }

    pub fn with_task_name(mut self, task_name: impl Into<String>) -> Self {
        self.task_name = task_name.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_wedge(mut self, wedge_name: impl Into<String>) -> Self {
        self.wedge_name = wedge_name.into();
        self
    }

    pub fn with_done_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.done_file = Some(path.into());
        self
    }

    /// Transition to `status`, stamping the change time.
    ///
    /// Resetting to `Unscheduled` also clears the running node, so a
    /// rescheduled job never points at the worker that lost it.
    pub fn set_status(&mut self, status: JobStatus, now: Instant) {
        if status == JobStatus::Unscheduled {
            self.running_node = None;
        }
        self.status = status;
        self.status_changed_at = now;
    }

    /// Time spent in the current status.
    pub fn status_age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.status_changed_at)
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
