// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! jgd: run one grid node.

use clap::{Parser, ValueEnum};
use jg_core::NodeRole;
use jg_node::{Engine, EngineError, NodeConfig};
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleArg {
    Worker,
    Coordinator,
    Aggregator,
}

impl From<RoleArg> for NodeRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Worker => NodeRole::Worker,
            RoleArg::Coordinator => NodeRole::Coordinator,
            RoleArg::Aggregator => NodeRole::Aggregator,
        }
    }
}

/// Grid node daemon.
#[derive(Debug, Parser)]
#[command(name = "jgd", version)]
struct Args {
    /// Role this node plays.
    #[arg(long, value_enum)]
    role: RoleArg,

    /// Address to bind the UDP socket to.
    #[arg(long, default_value = "0.0.0.0:7000")]
    listen: SocketAddr,

    /// Aggregator to register with (required for workers and coordinators).
    #[arg(long)]
    aggregator: Option<SocketAddr>,

    /// Human-readable node name; defaults to the hostname-style role tag.
    #[arg(long)]
    name: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), EngineError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("JG_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let role: NodeRole = args.role.into();
    let name = args.name.unwrap_or_else(|| format!("{role}-{}", args.listen.port()));

    let mut config = NodeConfig::new(name, role, args.listen);
    if let Some(aggregator) = args.aggregator {
        config = config.with_aggregator(aggregator);
    }

    let engine = Engine::start(config).await?;
    info!(addr = %engine.local_addr(), "node running, ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    engine.stop().await
}
