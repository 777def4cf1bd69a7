// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Submission, dispatch, and completion specs.

use crate::prelude::*;
use jg_core::Job;
use serial_test::serial;
use std::time::Instant;

#[tokio::test]
#[serial]
async fn submitted_job_runs_to_completion() {
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

    let job_dir = tempfile::tempdir().expect("job dir");
    let script = sh_script(job_dir.path(), "ok.sh", "exit 0");

    let mut events = coordinator.subscribe();
    let client = GridClient::bind().await.expect("client");
    let job =
        Job::new(script.display().to_string(), "_", Instant::now()).with_task_name("t1");
    client.submit(&endpoint(&coordinator), &job).await.expect("submit");

    assert!(
        wait_for_job_done(&mut events, Duration::from_secs(10)).await,
        "job never completed"
    );

    // Once acknowledged done, the job leaves the scheduling map entirely.
    let counts =
        client.query(&endpoint(&coordinator), Some("t1".to_string())).await.expect("query");
    assert_eq!(counts, JobCounts::default());

    // The worker credited the completion and advertises the task.
    assert!(
        wait_until(Duration::from_secs(5), || {
            coordinator
                .members()
                .iter()
                .any(|n| n.name == "w1" && n.completed_jobs >= 1 && !n.busy)
        })
        .await,
        "completion never credited to the worker"
    );

    drop(worker);
}

#[tokio::test]
#[serial]
async fn missing_done_file_keeps_the_job_failing() {
    let aggregator = start_aggregator().await;
    let agg_addr = aggregator.local_addr();
    let coordinator = start_coordinator("coord", agg_addr).await;
    let scratch = tempfile::tempdir().expect("scratch");
    let _worker = start_worker("w1", agg_addr, scratch.path()).await;

    assert!(
        wait_until(Duration::from_secs(5), || {
            coordinator.members().iter().any(|n| n.is_idle_worker())
        })
        .await,
        "coordinator never saw an idle worker"
    );

    let job_dir = tempfile::tempdir().expect("job dir");
    // Exits 0 but never creates the declared done-file.
    let script = sh_script(job_dir.path(), "liar.sh", "exit 0");

    let mut events = coordinator.subscribe();
    let client = GridClient::bind().await.expect("client");
    let job = Job::new(script.display().to_string(), "", Instant::now())
        .with_task_name("t5")
        .with_done_file(job_dir.path().join("never.ok"));
    client.submit(&endpoint(&coordinator), &job).await.expect("submit");

    // The job cycles dispatch → fail → reschedule and never completes.
    assert!(
        !wait_for_job_done(&mut events, Duration::from_secs(3)).await,
        "job completed despite the missing done-file"
    );
    let counts =
        client.query(&endpoint(&coordinator), Some("t5".to_string())).await.expect("query");
    assert!(counts.total() >= 1, "job left the scheduling map: {counts:?}");
}

#[tokio::test]
#[serial]
async fn single_worker_serializes_competing_jobs() {
    let aggregator = start_aggregator().await;
    let agg_addr = aggregator.local_addr();
    let coordinator = start_coordinator("coord", agg_addr).await;
    let scratch = tempfile::tempdir().expect("scratch");
    let _worker = start_worker("w1", agg_addr, scratch.path()).await;

    assert!(
        wait_until(Duration::from_secs(5), || {
            coordinator.members().iter().any(|n| n.is_idle_worker())
        })
        .await,
        "coordinator never saw an idle worker"
    );

    let job_dir = tempfile::tempdir().expect("job dir");
    let script = sh_script(job_dir.path(), "slow.sh", "sleep 0.3");

    let mut events = coordinator.subscribe();
    let client = GridClient::bind().await.expect("client");
    for _ in 0..2 {
        let job =
            Job::new(script.display().to_string(), "", Instant::now()).with_task_name("t2");
        client.submit(&endpoint(&coordinator), &job).await.expect("submit");
    }

    // Both jobs complete; the busy worker refuses the overlap and the
    // coordinator retries until the slot frees up.
    assert!(wait_for_job_done(&mut events, Duration::from_secs(10)).await, "first job");
    assert!(wait_for_job_done(&mut events, Duration::from_secs(10)).await, "second job");

    let counts = client.query(&endpoint(&coordinator), None).await.expect("query");
    assert_eq!(counts.total(), 0);
}
