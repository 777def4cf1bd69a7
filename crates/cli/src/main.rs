// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! jg: operator front end for the grid.

use anyhow::Context;
use clap::{Parser, Subcommand};
use jg::GridClient;
use jg_core::Job;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Debug, Parser)]
#[command(name = "jg", version, about = "Submit and manage grid jobs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit a job to a coordinator.
    Submit {
        /// Coordinator address (host:port).
        #[arg(long)]
        to: String,
        /// Command path to run on the worker.
        #[arg(long)]
        command: String,
        /// Arguments passed to the command.
        #[arg(long, default_value = "")]
        args: String,
        /// Task name grouping related jobs.
        #[arg(long, default_value = "")]
        task: String,
        /// Human-readable job name.
        #[arg(long)]
        name: Option<String>,
        /// Executor wedge to use on the worker.
        #[arg(long)]
        wedge: Option<String>,
        /// Path whose existence after the run marks success.
        #[arg(long)]
        done_file: Option<PathBuf>,
    },
    /// Query a coordinator's job counts.
    Query {
        /// Coordinator address (host:port).
        #[arg(long)]
        to: String,
        /// Restrict counts to one task name.
        #[arg(long)]
        task: Option<String>,
        /// Print the reply as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Block a node grid-wide.
    Block {
        /// Aggregator address (host:port).
        #[arg(long)]
        to: String,
        /// Guid of the node to block.
        #[arg(long)]
        guid: String,
    },
    /// Lift a block.
    Unblock {
        /// Aggregator address (host:port).
        #[arg(long)]
        to: String,
        /// Guid of the node to unblock.
        #[arg(long)]
        guid: String,
    },
    /// Resume job execution on a node.
    StartWork {
        /// Node address (host:port).
        #[arg(long)]
        to: String,
    },
    /// Pause job execution on a node.
    StopWork {
        /// Node address (host:port).
        #[arg(long)]
        to: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = GridClient::bind().await.context("binding client socket")?;

    match cli.command {
        Command::Submit { to, command, args, task, name, wedge, done_file } => {
            let mut job = Job::new(command, args, Instant::now()).with_task_name(task);
            if let Some(name) = name {
                job = job.with_name(name);
            }
            if let Some(wedge) = wedge {
                job = job.with_wedge(wedge);
            }
            if let Some(done_file) = done_file {
                job = job.with_done_file(done_file);
            }
            client.submit(&to, &job).await.context("submitting job")?;
            println!("submitted {} to {}", job.id, to);
        }
        Command::Query { to, task, json } => {
            let counts = client.query(&to, task).await.context("querying coordinator")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&counts)?);
            } else {
                println!(
                    "running={} dispatched={} non-scheduled={}",
                    counts.running, counts.dispatched, counts.non_scheduled
                );
            }
        }
        Command::Block { to, guid } => {
            client.block(&to, &guid).await.context("sending block")?;
            println!("blocked {guid}");
        }
        Command::Unblock { to, guid } => {
            client.unblock(&to, &guid).await.context("sending unblock")?;
            println!("unblocked {guid}");
        }
        Command::StartWork { to } => {
            client.start_work(&to).await.context("sending start-work")?;
            println!("work resumed on {to}");
        }
        Command::StopWork { to } => {
            client.stop_work(&to).await.context("sending stop-work")?;
            println!("work paused on {to}");
        }
    }
    Ok(())
}
