// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! UDP client for talking to grid nodes from outside the grid.
//!
//! The client binds an ephemeral socket and is not a member: it sends no
//! `<Node/>` self-description, so nodes never register it.

use jg_core::{Job, JobCounts};
use jg_wire::{Body, ControlCommand, JobEnvelope, JobManage, Message, WireError};
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("no reply within {0:?}")]
    Timeout(Duration),
}

pub struct GridClient {
    socket: UdpSocket,
    reply_window: Duration,
}

impl GridClient {
    /// Bind an ephemeral local socket.
    pub async fn bind() -> Result<Self, ClientError> {
        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        Ok(Self { socket, reply_window: Duration::from_secs(3) })
    }

    pub fn with_reply_window(mut self, window: Duration) -> Self {
        self.reply_window = window;
        self
    }

    async fn send(&self, target: &str, msg: &Message) -> Result<(), ClientError> {
        let bytes = jg_wire::encode(msg)?;
        self.socket.send_to(&bytes, target).await?;
        Ok(())
    }

    /// Submit a job to a coordinator. Fire-and-forget; track it with
    /// [`GridClient::query`].
    pub async fn submit(&self, coordinator: &str, job: &Job) -> Result<(), ClientError> {
        let msg = Message::new(Body::JobManage(JobManage::Submit {
            job: JobEnvelope::from_job(job),
        }));
        self.send(coordinator, &msg).await
    }

    /// Ask a coordinator for its job counts, waiting out the reply window.
    pub async fn query(
        &self,
        coordinator: &str,
        task_name: Option<String>,
    ) -> Result<JobCounts, ClientError> {
        let msg = Message::new(Body::JobManage(JobManage::Query { task_name }));
        self.send(coordinator, &msg).await?;

        let mut buf = vec![0u8; 64 * 1024];
        let deadline = tokio::time::Instant::now() + self.reply_window;
        loop {
            let (len, _) =
                tokio::time::timeout_at(deadline, self.socket.recv_from(&mut buf))
                    .await
                    .map_err(|_| ClientError::Timeout(self.reply_window))??;
            match jg_wire::decode(&buf[..len]) {
                Ok(Message { body: Body::JobManage(JobManage::Status { counts }), .. }) => {
                    return Ok(counts);
                }
                // Not the reply we are waiting for; keep listening.
                Ok(_) | Err(_) => continue,
            }
        }
    }

    /// Block a node grid-wide, via the aggregator.
    pub async fn block(&self, aggregator: &str, guid: &str) -> Result<(), ClientError> {
        self.control(aggregator, ControlCommand::Block, Some(guid)).await
    }

    pub async fn unblock(&self, aggregator: &str, guid: &str) -> Result<(), ClientError> {
        self.control(aggregator, ControlCommand::Unblock, Some(guid)).await
    }

    /// Resume job execution on a node.
    pub async fn start_work(&self, target: &str) -> Result<(), ClientError> {
        self.control(target, ControlCommand::StartWork, None).await
    }

    /// Pause job execution on a node.
    pub async fn stop_work(&self, target: &str) -> Result<(), ClientError> {
        self.control(target, ControlCommand::StopWork, None).await
    }

    async fn control(
        &self,
        target: &str,
        command: ControlCommand,
        guid: Option<&str>,
    ) -> Result<(), ClientError> {
        let msg = Message::new(Body::Control {
            command,
            guid: guid.map(str::to_string),
            result: None,
        });
        self.send(target, &msg).await
    }
}
