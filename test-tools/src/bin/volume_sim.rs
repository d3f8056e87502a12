/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! volume-sim – casts one `create_volume` request to the scheduler, the way
//! the volume API would.  The outcome shows up in the scheduler's and
//! backend-sim's logs.

use std::collections::BTreeMap;
use std::process;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{error, info};

use volsched::request::{FilterProperties, HintValue, RequestSpec, VolumeType};
use volsched::rpc::grpc::GrpcTransport;
use volsched::rpc::{CreateVolumeArgs, RpcVersion, SchedulerApi};

#[derive(Debug, Parser)]
#[command(name = "volume-sim", about = "Cast a create_volume request to volsched")]
struct Cli {
    /// Scheduler cast endpoint.
    #[arg(short = 's', long = "scheduler", default_value = "http://127.0.0.1:50060")]
    scheduler: String,

    /// Volume id; generated when omitted.
    #[arg(long = "volume-id")]
    volume_id: Option<String>,

    /// Requested size in GB.
    #[arg(short = 'g', long = "size-gb", default_value_t = 10)]
    size_gb: u64,

    /// Availability zone to place the volume in.
    #[arg(short = 'z', long = "zone")]
    zone: Option<String>,

    /// Volume type extra spec as key=value; repeatable.
    #[arg(short = 'e', long = "extra-spec")]
    extra_specs: Vec<String>,

    /// Scheduler hint as key=value; repeatable.
    #[arg(long = "hint")]
    hints: Vec<String>,

    /// Scheduler RPC version cap, e.g. "1.1".
    #[arg(long = "version-cap")]
    version_cap: Option<RpcVersion>,
}

fn key_value(raw: &str) -> Result<(String, String)> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| anyhow!("expected key=value, got '{raw}'"))
}

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
        error!("volume-sim failed: {:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let volume_id = cli
        .volume_id
        .unwrap_or_else(|| format!("vol-{}", Utc::now().timestamp_millis()));

    let mut spec = RequestSpec::new(&volume_id, cli.size_gb);
    if let Some(zone) = cli.zone {
        spec = spec.with_availability_zone(zone);
    }
    if !cli.extra_specs.is_empty() {
        let extra_specs = cli
            .extra_specs
            .iter()
            .map(|raw| key_value(raw))
            .collect::<Result<BTreeMap<_, _>>>()?;
        spec = spec.with_volume_type(VolumeType {
            name: "sim".to_string(),
            extra_specs,
        });
    }

    let mut props = FilterProperties::default();
    for raw in &cli.hints {
        let (k, v) = key_value(raw)?;
        props.scheduler_hints.insert(k, HintValue::from(v.as_str()));
    }

    let api = SchedulerApi::new(
        Arc::new(GrpcTransport::new(&[cli.scheduler.as_str()])?),
        "scheduler",
        cli.version_cap,
    );
    api.create_volume(CreateVolumeArgs {
        volume_id: volume_id.clone(),
        snapshot_id: None,
        request_spec: spec,
        image_id: None,
        filter_properties: Some(props),
    })
    .await?;

    info!(volume_id = %volume_id, size_gb = cli.size_gb, version = %api.negotiated_version(), "create_volume cast");
    Ok(())
}
