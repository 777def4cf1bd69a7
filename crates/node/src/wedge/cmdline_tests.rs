// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::os::unix::fs::PermissionsExt;
use tokio_util::sync::CancellationToken;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn job_for(command: &Path) -> Job {
    Job::new(command.display().to_string(), "", Instant::now())
}

#[tokio::test]
async fn successful_command_returns_true() {
    let source = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let script = write_script(source.path(), "ok.sh", "exit 0");

    let wedge = CommandLineWedge::new(scratch.path());
    let cancel = CancellationToken::new();
    let result = wedge.process_job(&job_for(&script), &cancel).await.unwrap();
    assert!(result);
}

#[tokio::test]
async fn failing_command_returns_false() {
    let source = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let script = write_script(source.path(), "bad.sh", "exit 3");

    let wedge = CommandLineWedge::new(scratch.path());
    let cancel = CancellationToken::new();
    let result = wedge.process_job(&job_for(&script), &cancel).await.unwrap();
    assert!(!result);
}

#[tokio::test]
async fn missing_done_file_fails_even_on_zero_exit() {
    let source = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let script = write_script(source.path(), "ok.sh", "exit 0");

    let job = job_for(&script).with_done_file(source.path().join("never-created.ok"));
    let wedge = CommandLineWedge::new(scratch.path());
    let cancel = CancellationToken::new();
    assert!(!wedge.process_job(&job, &cancel).await.unwrap());
}

#[tokio::test]
async fn created_done_file_passes() {
    let source = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let done = source.path().join("out.ok");
    let script = write_script(source.path(), "mk.sh", &format!("touch {}", done.display()));

    let job = job_for(&script).with_done_file(&done);
    let wedge = CommandLineWedge::new(scratch.path());
    let cancel = CancellationToken::new();
    assert!(wedge.process_job(&job, &cancel).await.unwrap());
}

#[tokio::test]
async fn cancellation_kills_the_child() {
    let source = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let script = write_script(source.path(), "sleep.sh", "sleep 30");

    let wedge = CommandLineWedge::new(scratch.path());
    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let result = wedge.process_job(&job_for(&script), &cancel).await.unwrap();
    assert!(!result);
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
}

#[tokio::test]
async fn deploy_skips_fresh_files_and_cleanup_removes_them() {
    let source = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let script = write_script(source.path(), "ok.sh", "exit 0");

    let wedge = CommandLineWedge::new(scratch.path());
    let deployed = wedge.deploy(&script).unwrap();
    assert!(deployed.exists());
    let first_mtime = fs::metadata(&deployed).unwrap().modified().unwrap();

    // Second deploy leaves the fresh copy alone
    let deployed_again = wedge.deploy(&script).unwrap();
    assert_eq!(deployed, deployed_again);
    assert_eq!(fs::metadata(&deployed).unwrap().modified().unwrap(), first_mtime);

    wedge.cleanup(&script.display().to_string()).await.unwrap();
    assert!(!deployed.exists());

    // Cleaning an already-clean command is fine
    wedge.cleanup(&script.display().to_string()).await.unwrap();
}

#[tokio::test]
async fn command_without_directory_is_rejected() {
    let scratch = tempfile::tempdir().unwrap();
    let wedge = CommandLineWedge::new(scratch.path());
    let cancel = CancellationToken::new();

    let job = Job::new("/", "", Instant::now());
    let err = wedge.process_job(&job, &cancel).await.unwrap_err();
    assert!(matches!(err, WedgeError::BadCommand(_)));
}
