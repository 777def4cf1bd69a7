// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker execution activity.
//!
//! Drains the run queue one job at a time. The busy flag is set at
//! acceptance (in the dispatcher) and always cleared here before the next
//! job is picked up.

use crate::engine::{EngineInner, RoleState};
use jg_core::{Clock, Job, JobStatus};
use jg_wire::{Body, ControlCommand, Message, ReportKind, Verdict};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub(crate) struct WorkerState {
    pub(crate) run_queue: Mutex<VecDeque<Job>>,
    pub(crate) done: Mutex<Vec<Job>>,
}

impl WorkerState {
    pub(crate) fn new() -> Self {
        Self { run_queue: Mutex::new(VecDeque::new()), done: Mutex::new(Vec::new()) }
    }
}

/// Execution activity on a worker.
pub(crate) async fn executor_loop<C: Clock>(inner: Arc<EngineInner<C>>) {
    loop {
        if inner.cancel.is_cancelled() {
            break;
        }
        let job = match &inner.role {
            RoleState::Worker(state) => state.run_queue.lock().pop_front(),
            _ => break,
        };
        match job {
            Some(job) => inner.run_job(job).await,
            None => {
                tokio::select! {
                    _ = inner.cancel.cancelled() => break,
                    _ = tokio::time::sleep(inner.config.timing.poll_interval) => {}
                }
            }
        }
    }
    debug!("executor stopped");
}

impl<C: Clock> EngineInner<C> {
    async fn run_job(&self, mut job: Job) {
        let coordinator = job.coordinator.clone().unwrap_or_default();

        // The pause signal short-circuits execution only; the coordinator
        // retries elsewhere or later.
        if self.paused.load(Ordering::Acquire) {
            info!(job_id = %job.id, "work is paused, refusing job");
            self.report(&coordinator, ReportKind::Info, "job refused: work is paused").await;
            self.send_job_done(&coordinator, &job, Verdict::Fail).await;
            self.busy.store(false, Ordering::Release);
            return;
        }

        self.busy.store(true, Ordering::Release);

        let verdict = match self.wedges.find(&job.wedge_name) {
            None => {
                error!(job_id = %job.id, wedge = %job.wedge_name, "no such wedge");
                self.report(
                    &coordinator,
                    ReportKind::Error,
                    &format!("no wedge named `{}`", job.wedge_name),
                )
                .await;
                Verdict::Fail
            }
            Some(wedge) => {
                *self.command_ran.lock().entry(job.command.clone()).or_insert(0) += 1;
                match wedge.process_job(&job, &self.cancel).await {
                    Err(e) => {
                        error!(job_id = %job.id, error = %e, "wedge failed");
                        self.report(&coordinator, ReportKind::Error, &e.to_string()).await;
                        Verdict::Fail
                    }
                    Ok(false) => {
                        info!(job_id = %job.id, "job reported failure");
                        Verdict::Fail
                    }
                    Ok(true) => match &job.done_file {
                        // The done-file is the authoritative success signal.
                        Some(done_file) if !done_file.exists() => {
                            warn!(
                                job_id = %job.id,
                                done_file = %done_file.display(),
                                "done-file missing after successful exit"
                            );
                            Verdict::Fail
                        }
                        _ => Verdict::Ok,
                    },
                }
            }
        };

        if verdict.is_ok() {
            let now = self.clock.now();
            self.completed_jobs.fetch_add(1, Ordering::Relaxed);
            if !job.task_name.is_empty() {
                *self.last_task.lock() = Some(job.task_name.clone());
            }
            job.set_status(JobStatus::Done, now);
            if let RoleState::Worker(state) = &self.role {
                state.done.lock().push(job.clone());
            }
            info!(job_id = %job.id, task = %job.task_name, "job finished");
        }

        // Free the slot before reporting, so the next heartbeat already
        // advertises an idle worker.
        self.busy.store(false, Ordering::Release);
        self.send_job_done(&coordinator, &job, verdict).await;
    }

    async fn send_job_done(&self, coordinator: &str, job: &Job, verdict: Verdict) {
        if coordinator.is_empty() {
            warn!(job_id = %job.id, "job has no coordinator to report to");
            return;
        }
        let msg = Message::new(Body::Control {
            command: ControlCommand::JobDone,
            guid: Some(job.id.as_str().to_string()),
            result: Some(verdict),
        })
        .with_sender(self.self_descriptor());
        self.send_to(coordinator, &msg).await;
    }

    pub(crate) async fn report(&self, target: &str, kind: ReportKind, text: &str) {
        if target.is_empty() {
            return;
        }
        let msg = Message::new(Body::Report { kind, text: text.to_string() })
            .with_sender(self.self_descriptor());
        self.send_to(target, &msg).await;
    }
}
