// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed model of the wire messages.

use crate::addr::canonicalize_host;
use jg_core::{Job, JobCounts, JobId, NodeId, NodeInfo, NodeRole};
use std::time::Instant;

/// Acknowledgement result, literal `OK` or `Fail` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ok,
    Fail,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Ok => "OK",
            Verdict::Fail => "Fail",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OK" => Some(Verdict::Ok),
            "Fail" => Some(Verdict::Fail),
            _ => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Verdict::Ok)
    }
}

/// Semantic verb of a `Control` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Registry,
    Block,
    Unblock,
    StartWork,
    StopWork,
    JobSchedule,
    JobDone,
}

impl ControlCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlCommand::Registry => "Registry",
            ControlCommand::Block => "Block",
            ControlCommand::Unblock => "Unblock",
            ControlCommand::StartWork => "StartWork",
            ControlCommand::StopWork => "StopWork",
            ControlCommand::JobSchedule => "JobSchedule",
            ControlCommand::JobDone => "JobDone",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Registry" => Some(ControlCommand::Registry),
            "Block" => Some(ControlCommand::Block),
            "Unblock" => Some(ControlCommand::Unblock),
            "StartWork" => Some(ControlCommand::StartWork),
            "StopWork" => Some(ControlCommand::StopWork),
            "JobSchedule" => Some(ControlCommand::JobSchedule),
            "JobDone" => Some(ControlCommand::JobDone),
            _ => None,
        }
    }
}

/// Severity verb of a `Report` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Info,
    Error,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Info => "Info",
            ReportKind::Error => "Error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Info" => Some(ReportKind::Info),
            "Error" => Some(ReportKind::Error),
            _ => None,
        }
    }
}

/// The `<Node …/>` element: one peer as described on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub role: NodeRole,
    pub name: String,
    pub ip: String,
    pub port: u16,
    pub guid: String,
    pub busy: bool,
    pub processor_count: u32,
    /// Task name of the last job this node completed.
    pub job_working: Option<String>,
}

impl NodeDescriptor {
    pub fn from_info(info: &NodeInfo) -> Self {
        Self {
            role: info.role,
            name: info.name.clone(),
            ip: info.host.clone(),
            port: info.port,
            guid: info.id.as_str().to_string(),
            busy: info.busy,
            processor_count: info.processor_count,
            job_working: info.last_task.clone(),
        }
    }

    /// Materialize a membership entry from this descriptor.
    ///
    /// The address field is canonicalized here, before insertion.
    pub fn into_info(self, now: Instant) -> NodeInfo {
        NodeInfo {
            id: NodeId::from_string(self.guid),
            name: self.name,
            host: canonicalize_host(&self.ip),
            port: self.port,
            role: self.role,
            processor_count: self.processor_count,
            busy: self.busy,
            fixed: false,
            last_seen: now,
            free_since: now,
            completed_jobs: 0,
            last_task: self.job_working,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", canonicalize_host(&self.ip), self.port)
    }
}

/// The `<Job …/>` element, root or embedded in a `JobManage`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEnvelope {
    pub guid: String,
    pub command: String,
    pub arguments: String,
    pub task_name: String,
    pub wedge_name: Option<String>,
    pub name: Option<String>,
    pub done_file: Option<String>,
}

impl JobEnvelope {
    pub fn from_job(job: &Job) -> Self {
        Self {
            guid: job.id.as_str().to_string(),
            command: job.command.clone(),
            arguments: job.arguments.clone(),
            task_name: job.task_name.clone(),
            wedge_name: Some(job.wedge_name.clone()).filter(|w| !w.is_empty()),
            name: Some(job.name.clone()).filter(|n| !n.is_empty()),
            done_file: job.done_file.as_ref().map(|p| p.display().to_string()),
        }
    }

    /// Materialize a job from the envelope; the receiving side owns it.
    pub fn into_job(self, now: Instant) -> Job {
        let mut job = Job::new(self.command, self.arguments, now).with_task_name(self.task_name);
        job.id = JobId::from_string(self.guid);
        if let Some(name) = self.name {
            job.name = name;
        } else {
            job.name = job.id.as_str().to_string();
        }
        if let Some(wedge) = self.wedge_name {
            job.wedge_name = wedge;
        }
        if let Some(done_file) = self.done_file {
            job.done_file = Some(done_file.into());
        }
        job
    }
}

/// Verbs of the `JobManage` message.
#[derive(Debug, Clone, PartialEq)]
pub enum JobManage {
    /// `command="JobSubmit"`: submit the embedded job to a coordinator.
    Submit { job: JobEnvelope },
    /// `command="JobQuery"`: ask for job counts, optionally per task.
    Query { task_name: Option<String> },
    /// `command="JobStatus"`: the reply, integer counts.
    Status { counts: JobCounts },
}

/// Payload of one datagram.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Control { command: ControlCommand, guid: Option<String>, result: Option<Verdict> },
    Report { kind: ReportKind, text: String },
    Resource { nodes: Vec<NodeDescriptor> },
    JobManage(JobManage),
    Job(JobEnvelope),
}

/// One decoded datagram: the payload plus the sender's self-description,
/// when the message carries one.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub sender: Option<NodeDescriptor>,
    pub body: Body,
}

impl Message {
    pub fn new(body: Body) -> Self {
        Self { sender: None, body }
    }

    pub fn with_sender(mut self, sender: NodeDescriptor) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Short label for logging and traffic events.
    pub fn kind(&self) -> &'static str {
        match &self.body {
            Body::Control { command, .. } => command.as_str(),
            Body::Report { .. } => "Report",
            Body::Resource { .. } => "Resource",
            Body::JobManage(JobManage::Submit { .. }) => "JobSubmit",
            Body::JobManage(JobManage::Query { .. }) => "JobQuery",
            Body::JobManage(JobManage::Status { .. }) => "JobStatus",
            Body::Job(_) => "Job",
        }
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
