// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-node integration specs.
//!
//! Each spec starts real nodes on loopback UDP with compressed timing and
//! drives them through the submission client, asserting on observable
//! protocol outcomes rather than internals.

#[path = "specs/prelude.rs"]
mod prelude;

#[path = "specs/membership.rs"]
mod membership;

#[path = "specs/dispatch.rs"]
mod dispatch;

#[path = "specs/recovery.rs"]
mod recovery;

#[path = "specs/operator.rs"]
mod operator;
