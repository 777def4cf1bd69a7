// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The command-line wedge.
//!
//! Deploys the command's containing directory into a scratch area (skipping
//! files the deployed copy already has at the same or newer mtime), runs the
//! deployed binary, and waits for exit or cancellation.

use super::{Wedge, WedgeError};
use async_trait::async_trait;
use jg_core::{Job, NodeInfo};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct CommandLineWedge {
    scratch_root: PathBuf,
}

pub(crate) const WEDGE_NAME: &str = jg_core::job::DEFAULT_WEDGE;

impl CommandLineWedge {
    pub fn new(scratch_root: impl Into<PathBuf>) -> Self {
        Self { scratch_root: scratch_root.into() }
    }

    /// Scratch directory for one source directory.
    fn deploy_dir(&self, source_dir: &Path) -> PathBuf {
        self.scratch_root.join(deploy_key(source_dir))
    }

    /// Copy the command's containing directory into the scratch area.
    ///
    /// Files already deployed with an mtime at least as new as the source
    /// are skipped. Returns the deployed command path.
    fn deploy(&self, command: &Path) -> Result<PathBuf, WedgeError> {
        let source_dir = command
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| WedgeError::BadCommand(command.display().to_string()))?;
        let file_name = command
            .file_name()
            .ok_or_else(|| WedgeError::BadCommand(command.display().to_string()))?;

        let target_dir = self.deploy_dir(source_dir);
        fs::create_dir_all(&target_dir)?;

        let mut copied = 0usize;
        for entry in fs::read_dir(source_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let target = target_dir.join(entry.file_name());
            if is_stale(&entry.path(), &target) {
                fs::copy(entry.path(), &target)?;
                copied += 1;
            }
        }
        debug!(
            source = %source_dir.display(),
            target = %target_dir.display(),
            copied,
            "deployed command directory"
        );
        Ok(target_dir.join(file_name))
    }
}

#[async_trait]
impl Wedge for CommandLineWedge {
    fn name(&self) -> &str {
        WEDGE_NAME
    }

    fn create_job(&self, now: Instant) -> Job {
        Job::new(String::new(), String::new(), now)
    }

    async fn execute(&self, node: &NodeInfo) -> Result<(), WedgeError> {
        debug!(node = %node.name, "command-line wedge ready");
        Ok(())
    }

    async fn cleanup(&self, command: &str) -> Result<(), WedgeError> {
        let Some(source_dir) = Path::new(command).parent() else {
            return Ok(());
        };
        let target_dir = self.deploy_dir(source_dir);
        match fs::remove_dir_all(&target_dir) {
            Ok(()) => {
                info!(dir = %target_dir.display(), "removed wedge scratch dir");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn process_job(
        &self,
        job: &Job,
        cancel: &CancellationToken,
    ) -> Result<bool, WedgeError> {
        let deployed = self.deploy(Path::new(&job.command))?;

        let mut cmd = tokio::process::Command::new(&deployed);
        if !job.arguments.is_empty() {
            cmd.args(job.arguments.split_whitespace());
        }
        if let Some(dir) = deployed.parent() {
            cmd.current_dir(dir);
        }
        cmd.kill_on_drop(true);

        info!(job_id = %job.id, command = %deployed.display(), args = %job.arguments, "running job");
        let mut child = cmd.spawn().map_err(|e| WedgeError::Spawn {
            command: deployed.display().to_string(),
            reason: e.to_string(),
        })?;

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = cancel.cancelled() => {
                warn!(job_id = %job.id, "cancelled, killing child process");
                let _ = child.kill().await;
                return Ok(false);
            }
        };

        if !status.success() {
            info!(job_id = %job.id, code = ?status.code(), "command exited non-zero");
            return Ok(false);
        }
        if let Some(done_file) = &job.done_file {
            return Ok(done_file.exists());
        }
        Ok(true)
    }
}

/// Filesystem-safe key for a source directory.
fn deploy_key(dir: &Path) -> String {
    let raw = dir.display().to_string();
    let key: String =
        raw.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect();
    key.trim_start_matches('_').to_string()
}

/// True when `target` is missing or older than `source`.
fn is_stale(source: &Path, target: &Path) -> bool {
    let Ok(target_meta) = fs::metadata(target) else {
        return true;
    };
    match (fs::metadata(source).and_then(|m| m.modified()), target_meta.modified()) {
        (Ok(src), Ok(dst)) => src > dst,
        _ => true,
    }
}

#[cfg(test)]
#[path = "cmdline_tests.rs"]
mod tests;
