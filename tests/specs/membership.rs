// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Discovery, registration, and resource propagation specs.

use crate::prelude::*;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn nodes_discover_each_other_through_the_aggregator() {
    let aggregator = start_aggregator().await;
    let agg_addr = aggregator.local_addr();
    let coordinator = start_coordinator("coord", agg_addr).await;
    let scratch = tempfile::tempdir().expect("scratch");
    let worker = start_worker("w1", agg_addr, scratch.path()).await;

    // Everyone keeps a fixed aggregator entry.
    let agg_endpoint = agg_addr.to_string();
    assert!(
        wait_until(Duration::from_secs(5), || {
            let knows = |members: &[jg_core::NodeInfo]| {
                members.iter().any(|n| n.endpoint() == agg_endpoint && n.fixed)
            };
            knows(&coordinator.members()) && knows(&worker.members())
        })
        .await,
        "aggregator entry missing or not fixed"
    );

    // The aggregator learns both peers from their registries.
    assert!(
        wait_until(Duration::from_secs(5), || {
            let members = aggregator.members();
            members.iter().any(|n| n.name == "coord") && members.iter().any(|n| n.name == "w1")
        })
        .await,
        "aggregator never learned its peers"
    );

    // The coordinator learns the idle worker from Resource broadcasts.
    assert!(
        wait_until(Duration::from_secs(5), || {
            coordinator
                .members()
                .iter()
                .any(|n| n.name == "w1" && n.role == NodeRole::Worker && !n.busy)
        })
        .await,
        "coordinator never learned the worker"
    );
}

#[tokio::test]
#[serial]
async fn remote_query_round_trip_from_another_node() {
    let aggregator = start_aggregator().await;
    let agg_addr = aggregator.local_addr();
    let coordinator = start_coordinator("coord", agg_addr).await;
    let scratch = tempfile::tempdir().expect("scratch");
    let worker = start_worker("w1", agg_addr, scratch.path()).await;

    // Query goes straight to the coordinator's address; no membership
    // entry is needed on the querying side.
    let counts = worker.query(&endpoint(&coordinator), None).await;
    assert_eq!(counts, Some(JobCounts::default()));
}
