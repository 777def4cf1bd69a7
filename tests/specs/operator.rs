// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator surface specs: block/unblock and pausing work.

use crate::prelude::*;
use jg_core::Job;
use serial_test::serial;
use std::time::Instant;

#[tokio::test]
#[serial]
async fn blocking_a_worker_removes_it_everywhere() {
    let aggregator = start_aggregator().await;
    let agg_addr = aggregator.local_addr();
    let coordinator = start_coordinator("coord", agg_addr).await;
    let scratch = tempfile::tempdir().expect("scratch");
    let _worker = start_worker("w1", agg_addr, scratch.path()).await;

    assert!(
        wait_until(Duration::from_secs(5), || {
            coordinator.members().iter().any(|n| n.name == "w1")
        })
        .await,
        "coordinator never learned the worker"
    );
    let guid = coordinator
        .members()
        .into_iter()
        .find(|n| n.name == "w1")
        .map(|n| n.id.as_str().to_string())
        .expect("worker guid");

    let client = GridClient::bind().await.expect("client");
    client.block(&agg_addr.to_string(), &guid).await.expect("block");

    // The block propagates; the worker drops out of every table and its
    // heartbeats stop re-registering it.
    assert!(
        wait_until(Duration::from_secs(5), || {
            !coordinator.members().iter().any(|n| n.name == "w1")
                && !aggregator.members().iter().any(|n| n.name == "w1")
        })
        .await,
        "blocked worker still present"
    );
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(
        !coordinator.members().iter().any(|n| n.name == "w1"),
        "blocked worker re-registered through its heartbeat"
    );

    // Unblock lets the next heartbeat re-register it grid-wide.
    client.unblock(&agg_addr.to_string(), &guid).await.expect("unblock");
    assert!(
        wait_until(Duration::from_secs(5), || {
            coordinator.members().iter().any(|n| n.name == "w1")
        })
        .await,
        "unblocked worker never came back"
    );
}

#[tokio::test]
#[serial]
async fn stop_work_pauses_execution_until_start_work() {
    let aggregator = start_aggregator().await;
    let agg_addr = aggregator.local_addr();
    let coordinator = start_coordinator("coord", agg_addr).await;
    let scratch = tempfile::tempdir().expect("scratch");
    let worker = start_worker("w1", agg_addr, scratch.path()).await;

    assert!(
        wait_until(Duration::from_secs(5), || {
            coordinator.members().iter().any(|n| n.is_idle_worker())
        })
        .await,
        "coordinator never saw an idle worker"
    );

    let client = GridClient::bind().await.expect("client");
    client.stop_work(&endpoint(&worker)).await.expect("stop work");
    // Give the pause a moment to land before submitting.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let job_dir = tempfile::tempdir().expect("job dir");
    let script = sh_script(job_dir.path(), "ok.sh", "exit 0");
    let mut events = coordinator.subscribe();
    let job = Job::new(script.display().to_string(), "", Instant::now()).with_task_name("t6");
    client.submit(&endpoint(&coordinator), &job).await.expect("submit");

    // While paused the worker refuses execution, so the job never
    // completes; it keeps bouncing back to the coordinator.
    assert!(
        !wait_for_job_done(&mut events, Duration::from_secs(2)).await,
        "job completed while the worker was paused"
    );
    let counts = client.query(&endpoint(&coordinator), None).await.expect("query");
    assert!(counts.total() >= 1);

    client.start_work(&endpoint(&worker)).await.expect("start work");
    assert!(
        wait_for_job_done(&mut events, Duration::from_secs(10)).await,
        "job never completed after start-work"
    );
}
