// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for other crates' tests.

use crate::clock::Clock;
use crate::job::Job;
use crate::node::{NodeId, NodeInfo, NodeRole};

/// A worker entry on localhost with the given name and port.
pub fn test_worker(clock: &impl Clock, name: &str, port: u16) -> NodeInfo {
    NodeInfo::new(NodeId::new(), name, "127.0.0.1", port, NodeRole::Worker, clock)
}

/// A worker that already completed `completed` jobs of `task`.
pub fn seasoned_worker(
    clock: &impl Clock,
    name: &str,
    port: u16,
    completed: u32,
    task: &str,
) -> NodeInfo {
    let mut info = test_worker(clock, name, port);
    info.completed_jobs = completed;
    if !task.is_empty() {
        info.last_task = Some(task.to_string());
    }
    info
}

/// An unscheduled job for `task` running `/bin/true`.
pub fn test_job(clock: &impl Clock, task: &str) -> Job {
    Job::new("/bin/true", "_", clock.now()).with_task_name(task)
}
