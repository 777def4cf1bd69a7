// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timeout and failure recovery specs.
//!
//! A scripted "fake worker" — a bare UDP socket speaking just enough of
//! the protocol — stands in for unresponsive or crashed peers.

use crate::prelude::*;
use jg_core::Job;
use jg_wire::{Body, ControlCommand, Message, NodeDescriptor, Verdict};
use serial_test::serial;
use std::time::Instant;
use tokio::net::UdpSocket;

/// A worker-shaped peer under test control.
struct FakeWorker {
    socket: UdpSocket,
    descriptor: NodeDescriptor,
}

impl FakeWorker {
    async fn bind(name: &str) -> Self {
        let socket = UdpSocket::bind(LOOPBACK_ANY).await.expect("bind fake worker");
        let port = socket.local_addr().expect("local addr").port();
        let descriptor = NodeDescriptor {
            role: NodeRole::Worker,
            name: name.to_string(),
            ip: "127.0.0.1".to_string(),
            port,
            guid: format!("node-fake-{port}"),
            busy: false,
            processor_count: 1,
            job_working: None,
        };
        Self { socket, descriptor }
    }

    async fn register_with(&self, target: SocketAddr) {
        let msg = Message::new(Body::Control {
            command: ControlCommand::Registry,
            guid: None,
            result: None,
        })
        .with_sender(self.descriptor.clone());
        let bytes = jg_wire::encode(&msg).expect("encode registry");
        self.socket.send_to(&bytes, target).await.expect("send registry");
    }

    /// Accept the next job offer, then fall silent forever.
    async fn accept_one_job_then_vanish(self) {
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let Ok((len, src)) = self.socket.recv_from(&mut buf).await else {
                return;
            };
            let Ok(msg) = jg_wire::decode(&buf[..len]) else {
                continue;
            };
            if let Body::Job(envelope) = msg.body {
                let mut descriptor = self.descriptor.clone();
                descriptor.busy = true;
                let reply = Message::new(Body::Control {
                    command: ControlCommand::JobSchedule,
                    guid: Some(envelope.guid),
                    result: Some(Verdict::Ok),
                })
                .with_sender(descriptor);
                let bytes = jg_wire::encode(&reply).expect("encode ack");
                let _ = self.socket.send_to(&bytes, src).await;
                return;
            }
        }
    }
}

#[tokio::test]
#[serial]
async fn unacknowledged_dispatch_times_out_and_retries_elsewhere() {
    let aggregator = start_aggregator().await;
    let agg_addr = aggregator.local_addr();
    let coordinator = start_coordinator("coord", agg_addr).await;

    // A worker that registers and then ignores every job offer.
    let deaf = FakeWorker::bind("deaf").await;
    deaf.register_with(agg_addr).await;
    deaf.register_with(coordinator.local_addr()).await;

    assert!(
        wait_until(Duration::from_secs(3), || {
            coordinator.members().iter().any(|n| n.name == "deaf")
        })
        .await,
        "coordinator never saw the deaf worker"
    );

    let job_dir = tempfile::tempdir().expect("job dir");
    let script = sh_script(job_dir.path(), "ok.sh", "exit 0");

    let mut events = coordinator.subscribe();
    let client = GridClient::bind().await.expect("client");
    let job = Job::new(script.display().to_string(), "", Instant::now()).with_task_name("t3");
    client.submit(&endpoint(&coordinator), &job).await.expect("submit");

    // The offer to the deaf worker times out; once a real worker shows
    // up, the job lands there instead.
    let scratch = tempfile::tempdir().expect("scratch");
    let _worker = start_worker("w-real", agg_addr, scratch.path()).await;

    assert!(
        wait_for_job_done(&mut events, Duration::from_secs(15)).await,
        "job never recovered from the unresponsive worker"
    );
    let counts = client.query(&endpoint(&coordinator), None).await.expect("query");
    assert_eq!(counts.total(), 0);
}

#[tokio::test]
#[serial]
async fn losing_a_worker_mid_job_reschedules_it() {
    let aggregator = start_aggregator().await;
    let agg_addr = aggregator.local_addr();
    let coordinator = start_coordinator("coord", agg_addr).await;

    // A worker that accepts the job, then disappears mid-run.
    let doomed = FakeWorker::bind("doomed").await;
    doomed.register_with(agg_addr).await;
    doomed.register_with(coordinator.local_addr()).await;

    assert!(
        wait_until(Duration::from_secs(3), || {
            coordinator.members().iter().any(|n| n.name == "doomed")
        })
        .await,
        "coordinator never saw the doomed worker"
    );

    let job_dir = tempfile::tempdir().expect("job dir");
    let script = sh_script(job_dir.path(), "ok.sh", "exit 0");

    let mut events = coordinator.subscribe();
    let client = GridClient::bind().await.expect("client");
    let job = Job::new(script.display().to_string(), "", Instant::now()).with_task_name("t4");
    client.submit(&endpoint(&coordinator), &job).await.expect("submit");

    let acceptor = tokio::spawn(doomed.accept_one_job_then_vanish());

    // The job reaches RemoteRunning on the doomed worker.
    assert!(
        wait_until(Duration::from_secs(5), || {
            coordinator.job_counts(Some("t4")).running == 1
        })
        .await,
        "job never reached the doomed worker"
    );
    let _ = acceptor.await;

    // Liveness eviction reschedules it; a healthy worker finishes it.
    let scratch = tempfile::tempdir().expect("scratch");
    let _worker = start_worker("w-real", agg_addr, scratch.path()).await;

    assert!(
        wait_for_job_done(&mut events, Duration::from_secs(15)).await,
        "job never recovered from the lost worker"
    );
    let counts = client.query(&endpoint(&coordinator), None).await.expect("query");
    assert_eq!(counts.total(), 0);
}
