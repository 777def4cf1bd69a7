// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the node crate.

use std::path::PathBuf;

/// Scratch area for wedge deployments: `JG_SCRATCH_DIR` > `$TMPDIR/jgd`.
pub fn scratch_dir() -> PathBuf {
    match std::env::var("JG_SCRATCH_DIR") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => std::env::temp_dir().join("jgd"),
    }
}

/// Processor count advertised in the node descriptor.
pub fn processor_count() -> u32 {
    std::thread::available_parallelism().map(|n| n.get() as u32).unwrap_or(1)
}
