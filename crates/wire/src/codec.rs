// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Encode/decode between [`Message`] and UTF-16LE XML datagrams.
//!
//! Elements are attribute-only. Encoding writes no BOM; decoding tolerates
//! and strips one.

use crate::message::{
    Body, ControlCommand, JobEnvelope, JobManage, Message, NodeDescriptor, ReportKind, Verdict,
};
use jg_core::{JobCounts, NodeRole};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

/// Errors from the wire codec.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("payload is not valid UTF-16")]
    Utf16,

    #[error("xml: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("xml write: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown message type `{0}`")]
    UnknownRoot(String),

    #[error("unknown command `{0}`")]
    UnknownCommand(String),

    #[error("missing attribute `{0}`")]
    MissingAttr(&'static str),

    #[error("malformed message: {0}")]
    Malformed(String),
}

/// Encode a string as UTF-16 little-endian bytes, no BOM.
pub fn utf16le_encode(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len() * 2);
    for unit in s.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}

/// Decode UTF-16 little-endian bytes, stripping a leading BOM if present.
pub fn utf16le_decode(bytes: &[u8]) -> Result<String, WireError> {
    if bytes.len() % 2 != 0 {
        return Err(WireError::Utf16);
    }
    let mut units: Vec<u16> =
        bytes.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect();
    if units.first() == Some(&0xFEFF) {
        units.remove(0);
    }
    String::from_utf16(&units).map_err(|_| WireError::Utf16)
}

/// Encode a message into one datagram payload.
pub fn encode(msg: &Message) -> Result<Vec<u8>, WireError> {
    Ok(utf16le_encode(&to_xml(msg)?))
}

/// Decode one datagram payload into a message.
pub fn decode(bytes: &[u8]) -> Result<Message, WireError> {
    from_xml(&utf16le_decode(bytes)?)
}

// ---------------------------------------------------------------- writing

/// Escape and append one attribute.
///
/// `BytesStart::push_attribute` writes values verbatim, so every value goes
/// through `escape` here; `unescape_value` undoes it on the read side.
fn push_attr(el: &mut BytesStart<'static>, key: &'static str, value: &str) {
    el.push_attribute((key, escape(value).as_ref()));
}

fn to_xml(msg: &Message) -> Result<String, WireError> {
    let mut writer = Writer::new(Vec::new());
    match &msg.body {
        Body::Control { command, guid, result } => {
            let mut el = BytesStart::new("Control");
            push_attr(&mut el, "command", command.as_str());
            if let Some(guid) = guid {
                push_attr(&mut el, "guid", guid);
            }
            if let Some(result) = result {
                push_attr(&mut el, "result", result.as_str());
            }
            write_with_children(&mut writer, el, msg.sender.as_ref(), None)?;
        }
        Body::Report { kind, text } => {
            let mut el = BytesStart::new("Report");
            push_attr(&mut el, "command", kind.as_str());
            push_attr(&mut el, "text", text);
            write_with_children(&mut writer, el, msg.sender.as_ref(), None)?;
        }
        Body::Resource { nodes } => {
            let mut el = BytesStart::new("Resource");
            push_attr(&mut el, "type", "Execution");
            writer.write_event(Event::Start(el))?;
            for node in nodes {
                writer.write_event(Event::Empty(node_element(node)))?;
            }
            writer.write_event(Event::End(BytesStart::new("Resource").to_end()))?;
        }
        Body::JobManage(manage) => {
            let mut el = BytesStart::new("JobManage");
            let mut job_child = None;
            match manage {
                JobManage::Submit { job } => {
                    push_attr(&mut el, "command", "JobSubmit");
                    job_child = Some(job);
                }
                JobManage::Query { task_name } => {
                    push_attr(&mut el, "command", "JobQuery");
                    if let Some(task) = task_name {
                        push_attr(&mut el, "taskName", task);
                    }
                }
                JobManage::Status { counts } => {
                    push_attr(&mut el, "command", "JobStatus");
                    push_attr(&mut el, "running", &counts.running.to_string());
                    push_attr(&mut el, "dispatched", &counts.dispatched.to_string());
                    push_attr(&mut el, "non-scheduled", &counts.non_scheduled.to_string());
                }
            }
            write_with_children(&mut writer, el, msg.sender.as_ref(), job_child)?;
        }
        Body::Job(job) => {
            write_with_children(&mut writer, job_element(job), msg.sender.as_ref(), None)?;
        }
    }
    String::from_utf8(writer.into_inner())
        .map_err(|_| WireError::Malformed("non-utf8 xml output".to_string()))
}

/// Write `root` as `<root/>` when childless or `<root>…children…</root>`,
/// with the sender `<Node/>` and an optional embedded `<Job/>`.
fn write_with_children(
    writer: &mut Writer<Vec<u8>>,
    root: BytesStart<'_>,
    sender: Option<&NodeDescriptor>,
    job: Option<&JobEnvelope>,
) -> Result<(), WireError> {
    let root_name = String::from_utf8_lossy(root.name().as_ref()).to_string();
    if sender.is_none() && job.is_none() {
        writer.write_event(Event::Empty(root))?;
        return Ok(());
    }
    writer.write_event(Event::Start(root))?;
    if let Some(job) = job {
        writer.write_event(Event::Empty(job_element(job)))?;
    }
    if let Some(sender) = sender {
        writer.write_event(Event::Empty(node_element(sender)))?;
    }
    writer.write_event(Event::End(BytesStart::new(root_name).to_end()))?;
    Ok(())
}

fn node_element(node: &NodeDescriptor) -> BytesStart<'static> {
    let mut el = BytesStart::new("Node");
    push_attr(&mut el, "type", node.role.wire_name());
    push_attr(&mut el, "name", &node.name);
    push_attr(&mut el, "ip", &node.ip);
    push_attr(&mut el, "port", &node.port.to_string());
    push_attr(&mut el, "guid", &node.guid);
    push_attr(&mut el, "busy", bool_str(node.busy));
    push_attr(&mut el, "processorCount", &node.processor_count.to_string());
    if let Some(job_working) = &node.job_working {
        push_attr(&mut el, "jobWorking", job_working);
    }
    el
}

fn job_element(job: &JobEnvelope) -> BytesStart<'static> {
    let mut el = BytesStart::new("Job");
    push_attr(&mut el, "guid", &job.guid);
    push_attr(&mut el, "command", &job.command);
    push_attr(&mut el, "arguments", &job.arguments);
    push_attr(&mut el, "taskName", &job.task_name);
    if let Some(wedge_name) = &job.wedge_name {
        push_attr(&mut el, "wedgeName", wedge_name);
    }
    if let Some(name) = &job.name {
        push_attr(&mut el, "name", name);
    }
    if let Some(done_file) = &job.done_file {
        push_attr(&mut el, "doneFile", done_file);
    }
    el
}

fn bool_str(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

// ---------------------------------------------------------------- parsing

/// Flat view of one parsed element: name plus attribute pairs.
struct Element {
    name: String,
    attrs: Vec<(String, String)>,
}

impl Element {
    fn from_start(e: &BytesStart<'_>) -> Result<Self, WireError> {
        let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
        let mut attrs = Vec::new();
        for attr in e.attributes().flatten() {
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let value = attr
                .unescape_value()
                .map_err(|e| WireError::Malformed(format!("bad attribute: {e}")))?
                .to_string();
            attrs.push((key, value));
        }
        Ok(Self { name, attrs })
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    fn require(&self, name: &'static str) -> Result<&str, WireError> {
        self.attr(name).ok_or(WireError::MissingAttr(name))
    }
}

fn from_xml(xml: &str) -> Result<Message, WireError> {
    let mut reader = Reader::from_str(xml);
    let mut root: Option<Element> = None;
    let mut children: Vec<Element> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let element = Element::from_start(e)?;
                if root.is_none() {
                    root = Some(element);
                } else {
                    children.push(element);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let root = root.ok_or_else(|| WireError::Malformed("no root element".to_string()))?;
    let sender = children.iter().find(|c| c.name == "Node").map(parse_node).transpose()?;

    let body = match root.name.as_str() {
        "Control" => {
            let command = root.require("command")?;
            let command = ControlCommand::parse(command)
                .ok_or_else(|| WireError::UnknownCommand(command.to_string()))?;
            Body::Control {
                command,
                guid: root.attr("guid").map(str::to_string),
                result: root.attr("result").and_then(Verdict::parse),
            }
        }
        "Report" => {
            let command = root.require("command")?;
            let kind = ReportKind::parse(command)
                .ok_or_else(|| WireError::UnknownCommand(command.to_string()))?;
            Body::Report { kind, text: root.attr("text").unwrap_or_default().to_string() }
        }
        "Resource" => {
            let nodes = children
                .iter()
                .filter(|c| c.name == "Node")
                .map(parse_node)
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Message { sender: None, body: Body::Resource { nodes } });
        }
        "JobManage" => {
            let command = root.require("command")?;
            let manage = match command {
                "JobSubmit" => {
                    let job = children
                        .iter()
                        .find(|c| c.name == "Job")
                        .ok_or(WireError::MissingAttr("Job"))?;
                    JobManage::Submit { job: parse_job(job)? }
                }
                "JobQuery" => {
                    JobManage::Query { task_name: root.attr("taskName").map(str::to_string) }
                }
                "JobStatus" => JobManage::Status {
                    counts: JobCounts {
                        running: parse_u32(&root, "running")?,
                        dispatched: parse_u32(&root, "dispatched")?,
                        non_scheduled: parse_u32(&root, "non-scheduled")?,
                    },
                },
                other => return Err(WireError::UnknownCommand(other.to_string())),
            };
            Body::JobManage(manage)
        }
        "Job" => Body::Job(parse_job(&root)?),
        other => return Err(WireError::UnknownRoot(other.to_string())),
    };

    Ok(Message { sender, body })
}

fn parse_node(el: &Element) -> Result<NodeDescriptor, WireError> {
    let role = el.require("type")?;
    let role = NodeRole::from_wire_name(role)
        .ok_or_else(|| WireError::Malformed(format!("unknown node type `{role}`")))?;
    Ok(NodeDescriptor {
        role,
        name: el.attr("name").unwrap_or_default().to_string(),
        ip: el.require("ip")?.to_string(),
        port: el
            .require("port")?
            .parse()
            .map_err(|_| WireError::Malformed("bad port".to_string()))?,
        guid: el.require("guid")?.to_string(),
        busy: el.attr("busy").map(parse_bool).unwrap_or(false),
        processor_count: el.attr("processorCount").and_then(|v| v.parse().ok()).unwrap_or(1),
        job_working: el.attr("jobWorking").map(str::to_string),
    })
}

fn parse_job(el: &Element) -> Result<JobEnvelope, WireError> {
    Ok(JobEnvelope {
        guid: el.require("guid")?.to_string(),
        command: el.require("command")?.to_string(),
        arguments: el.attr("arguments").unwrap_or_default().to_string(),
        task_name: el.attr("taskName").unwrap_or_default().to_string(),
        wedge_name: el.attr("wedgeName").map(str::to_string),
        name: el.attr("name").map(str::to_string),
        done_file: el.attr("doneFile").map(str::to_string),
    })
}

fn parse_u32(el: &Element, name: &'static str) -> Result<u32, WireError> {
    el.require(name)?.parse().map_err(|_| WireError::Malformed(format!("bad count `{name}`")))
}

fn parse_bool(s: &str) -> bool {
    s.eq_ignore_ascii_case("true") || s == "1"
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
