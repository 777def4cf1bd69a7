// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator job scheduling.
//!
//! Owns the scheduling map (every job this coordinator is responsible
//! for) and the done set awaiting cleanup. A pass runs every 100 ms:
//! advance job ages, dispatch the unscheduled, drain the done.

use crate::config::Timing;
use crate::engine::{EngineInner, RoleState};
use jg_core::{Clock, GridEvent, Job, JobCounts, JobId, JobStatus, Membership, NodeInfo};
use jg_wire::{Body, JobEnvelope, Message};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

pub(crate) struct CoordinatorState {
    pub(crate) scheduling: Mutex<HashMap<JobId, Job>>,
    pub(crate) done: Mutex<Vec<Job>>,
}

impl CoordinatorState {
    pub(crate) fn new() -> Self {
        Self { scheduling: Mutex::new(HashMap::new()), done: Mutex::new(Vec::new()) }
    }

    /// Counts by status, optionally restricted to one task name.
    pub(crate) fn job_counts(&self, task_name: Option<&str>) -> JobCounts {
        let scheduling = self.scheduling.lock();
        let mut counts = JobCounts::default();
        for job in scheduling.values() {
            if task_name.is_some_and(|t| job.task_name != t) {
                continue;
            }
            match job.status {
                JobStatus::Unscheduled => counts.non_scheduled += 1,
                JobStatus::Dispatched => counts.dispatched += 1,
                JobStatus::RemoteRunning | JobStatus::LocalRunning => counts.running += 1,
                JobStatus::Done => {}
            }
        }
        counts
    }

    /// Reset every job the lost node was running.
    ///
    /// Fired on peer eviction and on block; the reset clears the job's
    /// running-node reference, so nothing keeps pointing at the lost peer.
    pub(crate) fn reschedule_lost(&self, lost: &jg_core::NodeId, now: Instant) {
        let mut scheduling = self.scheduling.lock();
        for job in scheduling.values_mut() {
            let on_lost_node = job.running_node.as_ref() == Some(lost)
                && matches!(job.status, JobStatus::Dispatched | JobStatus::RemoteRunning);
            if on_lost_node {
                info!(job_id = %job.id, "running node lost, rescheduling");
                job.set_status(JobStatus::Unscheduled, now);
            }
        }
    }
}

/// One pass's outcome over the scheduling map.
#[derive(Debug, Default)]
pub(crate) struct PassPlan {
    pub(crate) to_dispatch: Vec<JobId>,
    pub(crate) finished: Vec<Job>,
}

/// Advance every job by status and age; pure over the map.
///
/// Timed-out jobs reset to Unscheduled here and dispatch on a later pass,
/// when the worker view has had a chance to refresh.
pub(crate) fn prepare(
    scheduling: &mut HashMap<JobId, Job>,
    now: Instant,
    timing: &Timing,
) -> PassPlan {
    let mut plan = PassPlan::default();
    let mut done_ids = Vec::new();
    for job in scheduling.values_mut() {
        match job.status {
            JobStatus::Unscheduled => plan.to_dispatch.push(job.id.clone()),
            JobStatus::Dispatched => {
                if job.status_age(now) > timing.dispatch_timeout {
                    info!(job_id = %job.id, "dispatch never acknowledged, resetting");
                    job.set_status(JobStatus::Unscheduled, now);
                }
            }
            JobStatus::RemoteRunning | JobStatus::LocalRunning => {
                if job.status_age(now) > timing.running_timeout {
                    info!(job_id = %job.id, "running too long, resetting");
                    job.set_status(JobStatus::Unscheduled, now);
                }
            }
            JobStatus::Done => done_ids.push(job.id.clone()),
        }
    }
    for id in done_ids {
        if let Some(job) = scheduling.remove(&id) {
            plan.finished.push(job);
        }
    }
    plan
}

/// Pick a dispatch target for a job.
///
/// Among idle workers, prefer the most-completed worker whose last task
/// matches this job's task name (affinity); otherwise the most-completed
/// idle worker overall. Ties go to iteration order.
pub(crate) fn pick_worker(
    membership: &Membership,
    task_name: &str,
) -> Option<NodeInfo> {
    let mut best: Option<&NodeInfo> = None;
    let mut affine: Option<&NodeInfo> = None;
    for node in membership.iter().filter(|n| n.is_idle_worker()) {
        if best.map_or(true, |b| node.completed_jobs > b.completed_jobs) {
            best = Some(node);
        }
        let matches_task = !task_name.is_empty() && node.last_task.as_deref() == Some(task_name);
        if matches_task && affine.map_or(true, |a| node.completed_jobs > a.completed_jobs) {
            affine = Some(node);
        }
    }
    affine.or(best).cloned()
}

/// Scheduler activity on a coordinator.
pub(crate) async fn scheduler_loop<C: Clock>(inner: Arc<EngineInner<C>>) {
    let mut interval = tokio::time::interval(inner.config.timing.schedule_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = inner.cancel.cancelled() => break,
            _ = interval.tick() => inner.schedule_pass().await,
        }
    }
    debug!("scheduler stopped");
}

impl<C: Clock> EngineInner<C> {
    pub(crate) async fn schedule_pass(&self) {
        let RoleState::Coordinator(state) = &self.role else {
            return;
        };
        let now = self.clock.now();

        let plan = {
            let mut scheduling = state.scheduling.lock();
            prepare(&mut scheduling, now, &self.config.timing)
        };

        for job_id in plan.to_dispatch {
            self.dispatch_job(state, &job_id, now).await;
        }

        if !plan.finished.is_empty() {
            state.done.lock().extend(plan.finished);
        }
        let finished = {
            let mut done = state.done.lock();
            std::mem::take(&mut *done)
        };
        for job in finished {
            self.cleanup_job(job);
        }
    }

    async fn dispatch_job(&self, state: &CoordinatorState, job_id: &JobId, now: Instant) {
        let Some(task_name) =
            state.scheduling.lock().get(job_id).map(|j| j.task_name.clone())
        else {
            return;
        };
        let target = {
            let membership = self.membership.lock();
            pick_worker(&membership, &task_name)
        };
        let Some(worker) = target else {
            // No idle worker this cycle; try again on the next pass.
            return;
        };

        let envelope = {
            let mut scheduling = state.scheduling.lock();
            let Some(job) = scheduling.get_mut(job_id) else {
                return;
            };
            if job.status != JobStatus::Unscheduled {
                return;
            }
            job.running_node = Some(worker.id.clone());
            job.set_status(JobStatus::Dispatched, now);
            JobEnvelope::from_job(job)
        };
        self.membership.lock().set_busy(&worker.id, true, now);

        info!(
            job_id = %job_id,
            worker = %worker.name,
            endpoint = %worker.endpoint(),
            "dispatching job"
        );
        let msg = Message::new(Body::Job(envelope)).with_sender(self.self_descriptor());
        self.send_to(&worker.endpoint(), &msg).await;
    }

    /// Role hook for drained done-set entries.
    fn cleanup_job(&self, job: Job) {
        info!(job_id = %job.id, task = %job.task_name, "job complete, dropping");
        let _ = self
            .events
            .send(GridEvent::JobDone { job_id: job.id, task_name: job.task_name });
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
