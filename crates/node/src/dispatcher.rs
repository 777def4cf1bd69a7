// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol rules: one decoded datagram in, state transitions and replies
//! out.
//!
//! The dispatcher is the single consumer of the inbound queue, so messages
//! from one sender are applied in arrival order. Every handled transition
//! is idempotent; re-registration and repeated blocks are no-ops.

use crate::engine::{EngineInner, RoleState};
use jg_core::{Clock, GridEvent, JobStatus, MembershipChange, NodeId, ReportLevel};
use jg_wire::{
    Body, ControlCommand, JobEnvelope, JobManage, Message, NodeDescriptor, ReportKind, Verdict,
};
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use tracing::{debug, info, warn};

impl<C: Clock> EngineInner<C> {
    pub(crate) async fn handle_datagram(&self, payload: Vec<u8>, src: SocketAddr) {
        let msg = match jg_wire::decode(&payload) {
            Ok(msg) => msg,
            Err(e) => {
                let raw = jg_wire::utf16le_decode(&payload)
                    .unwrap_or_else(|_| format!("{} raw bytes", payload.len()));
                warn!(from = %src, error = %e, raw = %raw, "malformed message, skipping");
                return;
            }
        };
        debug!(from = %src, kind = msg.kind(), "received");
        let _ =
            self.events.send(GridEvent::MessageReceived { from: src.to_string(), kind: msg.kind() });

        // Implicit registration: any addressed message that names its
        // sender refreshes the membership table.
        if let Some(sender) = &msg.sender {
            self.register_peer(sender.clone());
        }

        match msg.body {
            Body::Control { command, guid, result } => {
                self.handle_control(command, guid, result, src).await;
            }
            Body::Report { kind, text } => {
                let from = msg
                    .sender
                    .as_ref()
                    .map(|s| s.name.clone())
                    .unwrap_or_else(|| src.to_string());
                let level = match kind {
                    ReportKind::Info => {
                        info!(from = %from, "peer report: {text}");
                        ReportLevel::Info
                    }
                    ReportKind::Error => {
                        warn!(from = %from, "peer error report: {text}");
                        ReportLevel::Error
                    }
                };
                let _ = self.events.send(GridEvent::Report { level, from, text });
            }
            Body::Resource { nodes } => {
                let self_endpoint = self.self_endpoint();
                for node in nodes {
                    if node.endpoint() != self_endpoint {
                        self.register_peer(node);
                    }
                }
            }
            Body::JobManage(manage) => self.handle_job_manage(manage, src).await,
            Body::Job(envelope) => self.handle_job_offer(envelope, msg.sender.as_ref(), src).await,
        }
    }

    /// Upsert a peer described on the wire, firing membership events.
    pub(crate) fn register_peer(&self, descriptor: NodeDescriptor) {
        let now = self.clock.now();
        if descriptor.endpoint() == self.self_endpoint() {
            return;
        }
        let info = descriptor.into_info(now);
        let (change, snapshot) = {
            let mut membership = self.membership.lock();
            let change = membership.upsert(info.clone(), now);
            let snapshot = membership.get(&info.endpoint()).cloned();
            (change, snapshot)
        };
        match (change, snapshot) {
            (MembershipChange::Added, Some(node)) => {
                info!(peer = %node.name, endpoint = %node.endpoint(), role = %node.role, "peer registered");
                let _ = self.events.send(GridEvent::NodeAdded { node });
            }
            (MembershipChange::Updated, Some(node)) => {
                debug!(peer = %node.name, busy = node.busy, "peer updated");
                let _ = self.events.send(GridEvent::NodeUpdated { node });
            }
            (MembershipChange::Blocked, _) => {
                debug!(endpoint = %info.endpoint(), "ignoring blocked peer");
            }
            _ => {}
        }
    }

    async fn handle_control(
        &self,
        command: ControlCommand,
        guid: Option<String>,
        result: Option<Verdict>,
        src: SocketAddr,
    ) {
        match command {
            // The sender upsert already happened.
            ControlCommand::Registry => {}
            ControlCommand::Block => {
                let Some(guid) = guid else {
                    warn!(from = %src, "Block without guid");
                    return;
                };
                self.apply_block(&NodeId::from_string(guid.clone()));
                self.propagate_operator_command(ControlCommand::Block, &guid).await;
            }
            ControlCommand::Unblock => {
                let Some(guid) = guid else {
                    warn!(from = %src, "Unblock without guid");
                    return;
                };
                self.membership.lock().unblock(&NodeId::from_string(guid.clone()));
                info!(guid = %guid, "peer unblocked");
                self.propagate_operator_command(ControlCommand::Unblock, &guid).await;
            }
            ControlCommand::StartWork => {
                info!("work resumed");
                self.paused.store(false, Ordering::Release);
            }
            ControlCommand::StopWork => {
                info!("work paused");
                self.paused.store(true, Ordering::Release);
            }
            ControlCommand::JobSchedule => self.handle_job_schedule_ack(guid, result, src),
            ControlCommand::JobDone => self.handle_job_done(guid, result, src),
        }
    }

    /// Block a guid locally, rescheduling anything it was running.
    pub(crate) fn apply_block(&self, id: &NodeId) {
        let removed = self.membership.lock().block(id);
        if let Some(node) = removed {
            info!(peer = %node.name, guid = %id, "peer blocked and removed");
            if let RoleState::Coordinator(state) = &self.role {
                state.reschedule_lost(id, self.clock.now());
            }
            let _ = self.events.send(GridEvent::NodeRemoved { node });
        } else {
            info!(guid = %id, "guid blocked");
        }
    }

    /// The aggregator propagates operator Block/Unblock to every peer so
    /// all coordinators drop the target consistently.
    async fn propagate_operator_command(&self, command: ControlCommand, guid: &str) {
        if !matches!(self.role, RoleState::Aggregator(_)) {
            return;
        }
        let msg = Message::new(Body::Control {
            command,
            guid: Some(guid.to_string()),
            result: None,
        })
        .with_sender(self.self_descriptor());
        self.send_to_all(&msg, None).await;
    }

    /// Coordinator: a worker accepted or refused a dispatched job.
    fn handle_job_schedule_ack(&self, guid: Option<String>, result: Option<Verdict>, src: SocketAddr) {
        let RoleState::Coordinator(state) = &self.role else {
            return;
        };
        let (Some(guid), Some(result)) = (guid, result) else {
            warn!(from = %src, "JobSchedule without guid/result");
            return;
        };
        let now = self.clock.now();
        let mut scheduling = state.scheduling.lock();
        let Some(job) = scheduling.get_mut(guid.as_str()) else {
            debug!(guid = %guid, "JobSchedule for unknown job");
            return;
        };
        if job.status != JobStatus::Dispatched {
            debug!(guid = %guid, status = %job.status, "late JobSchedule ignored");
            return;
        }
        if result.is_ok() {
            info!(job_id = %job.id, "worker accepted job");
            job.set_status(JobStatus::RemoteRunning, now);
        } else {
            info!(job_id = %job.id, "worker refused job, rescheduling");
            job.set_status(JobStatus::Unscheduled, now);
        }
    }

    /// Coordinator: a worker finished (or failed) a running job.
    fn handle_job_done(&self, guid: Option<String>, result: Option<Verdict>, src: SocketAddr) {
        let RoleState::Coordinator(state) = &self.role else {
            return;
        };
        let (Some(guid), Some(result)) = (guid, result) else {
            warn!(from = %src, "JobDone without guid/result");
            return;
        };
        let now = self.clock.now();
        let worker_and_task = {
            let mut scheduling = state.scheduling.lock();
            let Some(job) = scheduling.get_mut(guid.as_str()) else {
                debug!(guid = %guid, "JobDone for unknown job");
                return;
            };
            let worker = job.running_node.clone();
            let task_name = job.task_name.clone();
            if result.is_ok() {
                // The worker-side done-file check is authoritative; no
                // re-check against this node's filesystem.
                info!(job_id = %job.id, task = %task_name, "job done");
                job.set_status(JobStatus::Done, now);
            } else {
                info!(job_id = %job.id, "job failed on worker, rescheduling");
                job.set_status(JobStatus::Unscheduled, now);
            }
            worker.map(|w| (w, task_name))
        };
        if let Some((worker_id, task_name)) = worker_and_task {
            let mut membership = self.membership.lock();
            if result.is_ok() {
                membership.record_completion(&worker_id, &task_name, now);
            } else {
                // The worker cleared its own busy flag after the failure.
                membership.set_busy(&worker_id, false, now);
            }
        }
    }

    async fn handle_job_manage(&self, manage: JobManage, src: SocketAddr) {
        match manage {
            JobManage::Submit { job } => {
                let RoleState::Coordinator(state) = &self.role else {
                    warn!(from = %src, "JobSubmit sent to a non-coordinator");
                    return;
                };
                let now = self.clock.now();
                let job = job.into_job(now);
                info!(job_id = %job.id, task = %job.task_name, command = %job.command, "job submitted");
                state.scheduling.lock().insert(job.id.clone(), job);
            }
            JobManage::Query { task_name } => {
                let RoleState::Coordinator(state) = &self.role else {
                    return;
                };
                let counts = state.job_counts(task_name.as_deref());
                let reply = Message::new(Body::JobManage(JobManage::Status { counts }))
                    .with_sender(self.self_descriptor());
                self.send_to(&src.to_string(), &reply).await;
            }
            JobManage::Status { counts } => {
                info!(
                    running = counts.running,
                    dispatched = counts.dispatched,
                    non_scheduled = counts.non_scheduled,
                    "job status reply"
                );
                let _ = self.events.send(GridEvent::QueryReply { counts });
            }
        }
    }

    /// Worker: a coordinator offers a job. Acceptance is an atomic
    /// test-and-set on the busy flag — the first offer in wins, a racing
    /// second offer is refused.
    async fn handle_job_offer(
        &self,
        envelope: JobEnvelope,
        sender: Option<&NodeDescriptor>,
        src: SocketAddr,
    ) {
        let RoleState::Worker(state) = &self.role else {
            warn!(from = %src, "Job sent to a non-worker");
            return;
        };
        let guid = envelope.guid.clone();
        let accepted = self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();

        let verdict = if accepted { Verdict::Ok } else { Verdict::Fail };
        let reply = Message::new(Body::Control {
            command: ControlCommand::JobSchedule,
            guid: Some(guid),
            result: Some(verdict),
        })
        .with_sender(self.self_descriptor());
        self.send_to(&src.to_string(), &reply).await;

        if !accepted {
            info!(from = %src, "refused job offer, already busy");
            return;
        }

        let now = self.clock.now();
        let mut job = envelope.into_job(now);
        job.coordinator =
            Some(sender.map(|s| s.endpoint()).unwrap_or_else(|| src.to_string()));
        job.set_status(JobStatus::LocalRunning, now);
        info!(job_id = %job.id, command = %job.command, "accepted job");
        state.run_queue.lock().push_back(job);
    }
}
