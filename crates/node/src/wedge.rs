// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The wedge plug-in surface.
//!
//! A wedge holds the logic to create and run one category of job. The
//! engine only ever talks to the trait; the command-line wedge in
//! [`crate::wedge::cmdline`] is the sole built-in.

mod cmdline;

pub use cmdline::CommandLineWedge;

use async_trait::async_trait;
use jg_core::{Job, NodeInfo};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum WedgeError {
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("no wedge named `{0}`")]
    UnknownWedge(String),

    #[error("cannot deploy `{0}`: no containing directory")]
    BadCommand(String),

    #[error("spawn `{command}` failed: {reason}")]
    Spawn { command: String, reason: String },
}

/// A named job executor.
#[async_trait]
pub trait Wedge: Send + Sync {
    /// Identifier matched against `Job::wedge_name`.
    fn name(&self) -> &str;

    /// Default-construct a job shaped for this wedge.
    fn create_job(&self, now: Instant) -> Job;

    /// One-shot node-start-time hook for warm-up.
    async fn execute(&self, _node: &NodeInfo) -> Result<(), WedgeError> {
        Ok(())
    }

    /// Erase any per-command scratch state at shutdown.
    async fn cleanup(&self, command: &str) -> Result<(), WedgeError>;

    /// Run the job to completion or cancellation.
    ///
    /// `Ok(true)` means the command exited successfully and, when the job
    /// declares a done-file, that the file now exists.
    async fn process_job(&self, job: &Job, cancel: &CancellationToken)
        -> Result<bool, WedgeError>;
}

/// The wedges available on this node.
#[derive(Clone)]
pub struct WedgeSet {
    wedges: Vec<Arc<dyn Wedge>>,
}

impl WedgeSet {
    /// Empty set; register wedges explicitly.
    pub fn new() -> Self {
        Self { wedges: Vec::new() }
    }

    /// The default set: just the command-line wedge.
    pub fn with_defaults(scratch_root: impl Into<std::path::PathBuf>) -> Self {
        let mut set = Self::new();
        set.register(Arc::new(CommandLineWedge::new(scratch_root)));
        set
    }

    pub fn register(&mut self, wedge: Arc<dyn Wedge>) {
        self.wedges.push(wedge);
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn Wedge>> {
        self.wedges.iter().find(|w| w.name() == name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Wedge>> {
        self.wedges.iter()
    }
}

impl Default for WedgeSet {
    fn default() -> Self {
        Self::new()
    }
}
