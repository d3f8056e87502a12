/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use volsched::config::SchedulerConfig;
use volsched::context::SchedulerContext;
use volsched::host_manager::{FileServiceDirectory, ServiceDirectory, StaticServiceDirectory};
use volsched::manager::SchedulerManager;
use volsched::rpc::grpc::{self, CastReceiver, GrpcTransport};
use volsched::rpc::transport::CAST_QUEUE_DEPTH;
use volsched::rpc::RPC_API_VERSION;
use volsched::volume::{InMemoryVolumeStore, VolumeRpcApi};

// ── CLI argument definition ───────────────────────────────────────────────────

/// Volume scheduler: picks the backend every new volume is placed on.
///
/// Example:
///   volsched --config volsched.yaml --services services.yaml \
///            --listen 0.0.0.0:50060 --volume-endpoint http://127.0.0.1:50061
#[derive(Debug, Parser)]
#[command(
    name = "volsched",
    about = "Filter/weigher volume scheduler",
    long_about = None,
)]
struct Cli {
    /// Address of the cast endpoint (receives scheduler RPCs and capability reports).
    #[arg(short = 'l', long = "listen", default_value = "0.0.0.0:50060")]
    listen: SocketAddr,

    /// Path to the YAML scheduler configuration file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Path to the YAML service directory (overrides `service_directory.file`).
    #[arg(short = 's', long = "services")]
    services: Option<PathBuf>,

    /// Cast endpoint of the volume services; repeat for several.
    #[arg(short = 'v', long = "volume-endpoint", default_value = "http://127.0.0.1:50061")]
    volume_endpoints: Vec<String>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=info).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .init();

    info!("volsched starting up...");

    let cli = Cli::parse();
    info!(
        listen   = %cli.listen,
        config   = ?cli.config,
        services = ?cli.services,
        volume_endpoints = ?cli.volume_endpoints,
        "Configuration"
    );

    if let Err(e) = run(cli).await {
        error!("volsched failed: {:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // ── Configuration ─────────────────────────────────────────────────────────
    let config = match &cli.config {
        Some(path) => SchedulerConfig::load_from_file(path)?,
        None => {
            warn!("No configuration file provided, using default scheduler settings");
            SchedulerConfig::default()
        }
    };

    let directory: Arc<dyn ServiceDirectory> =
        match cli.services.clone().or_else(|| config.service_directory.file.clone()) {
            Some(path) => {
                info!("Using service directory: {}", path.display());
                Arc::new(FileServiceDirectory::new(path))
            }
            None => {
                warn!("No service directory provided, no host will be schedulable");
                Arc::new(StaticServiceDirectory::default())
            }
        };

    // ── Wiring ────────────────────────────────────────────────────────────────
    // A pinned cap keeps this node from accepting casts newer than its peers.
    let supported = config.rpc.version_cap()?.unwrap_or(RPC_API_VERSION);
    let ctx = Arc::new(SchedulerContext::new(config, directory).context("Invalid scheduler configuration")?);
    let volume_transport = Arc::new(GrpcTransport::new(&cli.volume_endpoints)?);
    let manager = Arc::new(SchedulerManager::new(
        ctx,
        Arc::new(VolumeRpcApi::new(volume_transport)),
        Arc::new(InMemoryVolumeStore::new()),
    ));

    info!(%supported, "Accepting scheduler RPC casts");
    let (tx, rx) = mpsc::channel(CAST_QUEUE_DEPTH);
    let manager_task = tokio::spawn(manager.run(rx));

    // ── Serve until Ctrl-C ────────────────────────────────────────────────────
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown requested");
    };
    grpc::serve(cli.listen, CastReceiver::new(supported, tx), shutdown).await?;

    // The receiver (and its sender) is gone; the manager drains and exits.
    manager_task.await?;
    info!("volsched stopped");
    Ok(())
}
