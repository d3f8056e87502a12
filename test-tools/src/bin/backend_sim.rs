/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! backend-sim – simulates a fleet of storage backends.
//!
//! * Every `--interval-secs`, fans out one `update_service_capabilities`
//!   report per backend to the scheduler(s).
//! * Serves the volume-service cast endpoint on `--listen`.  A
//!   `create_volume` for a backend flagged `fail: true` is bounced back to
//!   the scheduler with the failure recorded in the retry history; any other
//!   backend "creates" the volume and shrinks its free capacity.
//!
//! Fleet file:
//! ```yaml
//! backends:
//!   - host: host1
//!     backend_name: lvm-1
//!     total_capacity_gb: 1024
//!     free_capacity_gb: 1024
//!     reserved_percentage: 10
//!     capabilities: { tier: gold, max_iops: 1000 }
//!   - host: host2
//!     backend_name: lvm-2
//!     total_capacity_gb: 2048
//!     free_capacity_gb: 300
//!     fail: true
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use volsched::host_state::{Capabilities, CapabilityReport, Capacity};
use volsched::rpc::grpc::{self, CastReceiver, GrpcTransport};
use volsched::rpc::transport::CAST_QUEUE_DEPTH;
use volsched::rpc::{CapabilityUpdateArgs, CreateVolumeArgs, Envelope, RpcVersion, SchedulerApi};
use volsched::volume::{VolumeCreateArgs, VOLUME_RPC_VERSION};

#[derive(Debug, Parser)]
#[command(name = "backend-sim", about = "Simulated storage backends for volsched")]
struct Cli {
    /// YAML fleet description.
    #[arg(short = 'f', long = "fleet")]
    fleet: PathBuf,

    /// Address of this simulator's volume-service cast endpoint.
    #[arg(short = 'l', long = "listen", default_value = "0.0.0.0:50061")]
    listen: SocketAddr,

    /// Scheduler cast endpoint; repeat for several schedulers.
    #[arg(short = 's', long = "scheduler", default_value = "http://127.0.0.1:50060")]
    schedulers: Vec<String>,

    /// Seconds between capability reports.
    #[arg(short = 'i', long = "interval-secs", default_value_t = 10)]
    interval_secs: u64,

    /// Scheduler RPC version cap, e.g. "1.2".
    #[arg(long = "version-cap")]
    version_cap: Option<RpcVersion>,
}

#[derive(Debug, Clone, Deserialize)]
struct FleetFile {
    backends: Vec<Backend>,
}

#[derive(Debug, Clone, Deserialize)]
struct Backend {
    host: String,
    backend_name: String,
    total_capacity_gb: Capacity,
    free_capacity_gb: Capacity,
    #[serde(default)]
    allocated_capacity_gb: f64,
    #[serde(default)]
    reserved_percentage: u32,
    #[serde(default)]
    capabilities: Capabilities,
    /// Every create on this backend fails.
    #[serde(default)]
    fail: bool,
}

impl Backend {
    fn report(&self) -> CapabilityReport {
        CapabilityReport {
            host: self.host.clone(),
            backend_name: self.backend_name.clone(),
            total_capacity_gb: self.total_capacity_gb,
            free_capacity_gb: self.free_capacity_gb,
            allocated_capacity_gb: self.allocated_capacity_gb,
            reserved_percentage: self.reserved_percentage,
            capabilities: self.capabilities.clone(),
            timestamp: Utc::now(),
        }
    }
}

type Fleet = Arc<Mutex<Vec<Backend>>>;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("backend-sim failed: {:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let content = std::fs::read_to_string(&cli.fleet)
        .with_context(|| format!("Cannot open fleet file: {}", cli.fleet.display()))?;
    let file: FleetFile = serde_yaml::from_str(&content).context("Failed to parse fleet YAML")?;
    info!("Simulating {} backend(s)", file.backends.len());
    let fleet: Fleet = Arc::new(Mutex::new(file.backends));

    let api = Arc::new(SchedulerApi::new(
        Arc::new(GrpcTransport::new(&cli.schedulers)?),
        "scheduler",
        cli.version_cap,
    ));

    tokio::spawn(report_loop(
        Arc::clone(&fleet),
        Arc::clone(&api),
        Duration::from_secs(cli.interval_secs.max(1)),
    ));

    let (tx, rx) = mpsc::channel(CAST_QUEUE_DEPTH);
    tokio::spawn(volume_loop(Arc::clone(&fleet), Arc::clone(&api), rx));

    grpc::serve(cli.listen, CastReceiver::new(VOLUME_RPC_VERSION, tx), async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

/// Periodic fanout of every backend's capabilities.
async fn report_loop(fleet: Fleet, api: Arc<SchedulerApi>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let reports: Vec<CapabilityReport> = fleet
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(Backend::report)
            .collect();
        for report in reports {
            let host = report.host.clone();
            let args = CapabilityUpdateArgs {
                service_name: "volume".to_string(),
                host: host.clone(),
                capabilities: report,
            };
            if let Err(e) = api.update_service_capabilities(args).await {
                warn!(host = %host, error = %e, "capability report not sent");
            }
        }
    }
}

/// Act on casts addressed to the simulated volume services.
async fn volume_loop(fleet: Fleet, api: Arc<SchedulerApi>, mut rx: mpsc::Receiver<Envelope>) {
    while let Some(envelope) = rx.recv().await {
        if envelope.method != "create_volume" {
            info!(method = %envelope.method, args = ?envelope.args, "volume operation accepted");
            continue;
        }
        let args: VolumeCreateArgs = match envelope.decode_args() {
            Ok(a) => a,
            Err(e) => {
                warn!(error = %e, "bad create_volume payload");
                continue;
            }
        };

        let fails = create_on_backend(&fleet, &args.host, args.request_spec.size_gb);
        if !fails {
            info!(volume_id = %args.volume_id, host = %args.host, "volume created");
            continue;
        }
        if !args.allow_reschedule {
            warn!(volume_id = %args.volume_id, host = %args.host, "volume creation failed, no reschedule");
            continue;
        }

        warn!(volume_id = %args.volume_id, host = %args.host, "volume creation failed, rescheduling");
        let mut props = args.filter_properties;
        props.record_failure(&args.host, "simulated backend failure");
        let retry = CreateVolumeArgs {
            volume_id: args.volume_id.clone(),
            snapshot_id: args.snapshot_id,
            request_spec: args.request_spec,
            image_id: args.image_id,
            filter_properties: Some(props),
        };
        if let Err(e) = api.create_volume(retry).await {
            warn!(volume_id = %args.volume_id, error = %e, "reschedule not sent");
        }
    }
}

/// Returns `true` when the backend is flagged to fail (or unknown).
fn create_on_backend(fleet: &Fleet, host: &str, size_gb: u64) -> bool {
    let mut fleet = fleet.lock().unwrap_or_else(|e| e.into_inner());
    match fleet.iter_mut().find(|b| b.host == host) {
        Some(b) if !b.fail => {
            if let Capacity::Known(free) = b.free_capacity_gb {
                b.free_capacity_gb = Capacity::Known(free - size_gb as f64);
            }
            b.allocated_capacity_gb += size_gb as f64;
            false
        }
        _ => true,
    }
}
