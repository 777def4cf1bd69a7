// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use jg_core::test_support::test_worker;
use jg_core::{Clock, FakeClock};
use std::time::Duration;

fn timing() -> Timing {
    Timing::default()
}

#[test]
fn first_check_broadcasts_immediately() {
    let clock = FakeClock::new();
    let trigger = BroadcastTrigger::new();
    assert!(trigger.should_broadcast(clock.now(), &timing()));
}

#[test]
fn quiet_grid_rebroadcasts_on_the_interval() {
    let clock = FakeClock::new();
    let mut trigger = BroadcastTrigger::new();
    trigger.mark_broadcast(clock.now());

    clock.advance(Duration::from_secs(9));
    assert!(!trigger.should_broadcast(clock.now(), &timing()));

    clock.advance(Duration::from_secs(1));
    assert!(trigger.should_broadcast(clock.now(), &timing()));
}

#[test]
fn membership_change_broadcasts_after_short_debounce() {
    let clock = FakeClock::new();
    let mut trigger = BroadcastTrigger::new();
    trigger.mark_broadcast(clock.now());

    clock.advance(Duration::from_secs(1));
    trigger.note(PendingChange::Membership, clock.now());
    assert!(!trigger.should_broadcast(clock.now(), &timing()));

    clock.advance(Duration::from_millis(499));
    assert!(!trigger.should_broadcast(clock.now(), &timing()));

    clock.advance(Duration::from_millis(1));
    assert!(trigger.should_broadcast(clock.now(), &timing()));
}

#[test]
fn update_change_waits_the_longer_debounce() {
    let clock = FakeClock::new();
    let mut trigger = BroadcastTrigger::new();
    trigger.mark_broadcast(clock.now());

    trigger.note(PendingChange::Update, clock.now());
    clock.advance(Duration::from_millis(600));
    assert!(!trigger.should_broadcast(clock.now(), &timing()));

    clock.advance(Duration::from_millis(400));
    assert!(trigger.should_broadcast(clock.now(), &timing()));
}

#[test]
fn membership_change_upgrades_a_pending_update() {
    let clock = FakeClock::new();
    let mut trigger = BroadcastTrigger::new();
    trigger.mark_broadcast(clock.now());

    trigger.note(PendingChange::Update, clock.now());
    trigger.note(PendingChange::Membership, clock.now());

    clock.advance(Duration::from_millis(500));
    assert!(trigger.should_broadcast(clock.now(), &timing()));
}

#[test]
fn mark_broadcast_clears_pending() {
    let clock = FakeClock::new();
    let mut trigger = BroadcastTrigger::new();
    trigger.note(PendingChange::Membership, clock.now());
    trigger.mark_broadcast(clock.now());

    clock.advance(Duration::from_secs(2));
    assert!(!trigger.should_broadcast(clock.now(), &timing()));
}

#[test]
fn twenty_five_idle_workers_batch_as_ten_ten_five() {
    let clock = FakeClock::new();
    let idle: Vec<_> = (0..25u16)
        .map(|i| test_worker(&clock, &format!("w{i}"), 7100 + i))
        .collect();

    let batches: Vec<usize> = idle.chunks(timing().resource_batch).map(|c| c.len()).collect();
    assert_eq!(batches, vec![10, 10, 5]);
}
