/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Scheduler configuration loading.
//!
//! The expected YAML structure is (every key optional):
//! ```yaml
//! scheduler:
//!   topic: "volume"
//!   default_filters: [AvailabilityZoneFilter, CapacityFilter, CapabilitiesFilter, RetryFilter]
//!   default_weighers: [CapacityWeigher]
//!   capacity_weight_multiplier: 1.0
//!   allocated_capacity_weight_multiplier: -1.0
//!   capacity_weigher_use_ratio: false
//!   reserved_basis: total          # or "free"
//!   max_attempts: 3
//!   service_down_time_secs: 60
//!   directory_sync_timeout_ms: 2000
//! rpc:
//!   version_cap: "1.5"
//! service_directory:
//!   file: "services.yaml"
//! ```
//!
//! `reserved_basis` documents an assumption: by default a backend's reserved
//! percentage is a share of its *total* capacity withheld from allocation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::filters::FilterChain;
use crate::host_state::ReservedBasis;
use crate::rpc::version::RpcVersion;
use crate::weights::WeigherChain;

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Topic volume backends report capabilities under.
pub const DEFAULT_TOPIC: &str = "volume";

fn default_topic() -> String {
    DEFAULT_TOPIC.to_string()
}

fn default_filters() -> Vec<String> {
    [
        "AvailabilityZoneFilter",
        "CapacityFilter",
        "CapabilitiesFilter",
        "RetryFilter",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_weighers() -> Vec<String> {
    vec!["CapacityWeigher".to_string()]
}

fn default_capacity_multiplier() -> f64 {
    1.0
}

fn default_allocated_multiplier() -> f64 {
    -1.0
}

fn default_max_attempts() -> u32 {
    3
}

fn default_service_down_time_secs() -> u64 {
    60
}

fn default_sync_timeout_ms() -> u64 {
    2_000
}

// ── Public data structures ────────────────────────────────────────────────────

/// Filter/weigher and host-manager tunables.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerSection {
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Filter names, resolved once at startup in this order.
    #[serde(default = "default_filters")]
    pub default_filters: Vec<String>,

    #[serde(default = "default_weighers")]
    pub default_weighers: Vec<String>,

    /// Positive spreads volumes onto the emptiest backend, negative stacks
    /// them onto the fullest.
    #[serde(default = "default_capacity_multiplier")]
    pub capacity_weight_multiplier: f64,

    #[serde(default = "default_allocated_multiplier")]
    pub allocated_capacity_weight_multiplier: f64,

    /// Weigh free capacity as a fraction of total instead of absolute GB.
    #[serde(default)]
    pub capacity_weigher_use_ratio: bool,

    #[serde(default)]
    pub reserved_basis: ReservedBasis,

    /// Scheduling attempts per request, including the first.  `1` disables
    /// rescheduling.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// A host whose last heartbeat is older than this is considered down.
    #[serde(default = "default_service_down_time_secs")]
    pub service_down_time_secs: u64,

    /// Bound on one service-directory re-sync.
    #[serde(default = "default_sync_timeout_ms")]
    pub directory_sync_timeout_ms: u64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            default_filters: default_filters(),
            default_weighers: default_weighers(),
            capacity_weight_multiplier: default_capacity_multiplier(),
            allocated_capacity_weight_multiplier: default_allocated_multiplier(),
            capacity_weigher_use_ratio: false,
            reserved_basis: ReservedBasis::default(),
            max_attempts: default_max_attempts(),
            service_down_time_secs: default_service_down_time_secs(),
            directory_sync_timeout_ms: default_sync_timeout_ms(),
        }
    }
}

impl SchedulerSection {
    pub fn service_down_time(&self) -> Duration {
        Duration::from_secs(self.service_down_time_secs)
    }

    pub fn directory_sync_timeout(&self) -> Duration {
        Duration::from_millis(self.directory_sync_timeout_ms)
    }
}

/// RPC client tunables.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RpcSection {
    /// Highest version the remote scheduler is known to speak, e.g. during a
    /// rolling upgrade.  `None` means the local maximum.
    #[serde(default)]
    pub version_cap: Option<String>,
}

impl RpcSection {
    /// Parsed `version_cap`.
    pub fn version_cap(&self) -> Result<Option<RpcVersion>> {
        self.version_cap
            .as_deref()
            .map(|v| v.parse::<RpcVersion>().with_context(|| format!("invalid rpc.version_cap '{v}'")))
            .transpose()
    }
}

/// Where the service directory lives.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceDirectorySection {
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Complete scheduler configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub scheduler: SchedulerSection,

    #[serde(default)]
    pub rpc: RpcSection,

    #[serde(default)]
    pub service_directory: ServiceDirectorySection,
}

impl SchedulerConfig {
    /// Parse and validate `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, the YAML is structurally
    /// invalid, or a value fails [`validate`](Self::validate).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading scheduler configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;

        Self::from_yaml(&content)
            .with_context(|| format!("Invalid configuration file: {}", path.display()))
    }

    /// Parse and validate a YAML document.  An empty document yields the
    /// defaults.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let cfg: SchedulerConfig = if content.trim().is_empty() {
            SchedulerConfig::default()
        } else {
            serde_yaml::from_str(content).context("Failed to parse YAML")?
        };
        cfg.validate()?;

        debug!(
            filters  = ?cfg.scheduler.default_filters,
            weighers = ?cfg.scheduler.default_weighers,
            max_attempts = cfg.scheduler.max_attempts,
            reserved_basis = ?cfg.scheduler.reserved_basis,
            "scheduler configuration"
        );
        Ok(cfg)
    }

    /// Reject values the scheduler cannot run with.
    pub fn validate(&self) -> Result<()> {
        let s = &self.scheduler;
        if s.max_attempts == 0 {
            bail!("scheduler.max_attempts must be at least 1");
        }
        if s.topic.is_empty() {
            bail!("scheduler.topic must not be empty");
        }
        if !s.capacity_weight_multiplier.is_finite()
            || !s.allocated_capacity_weight_multiplier.is_finite()
        {
            bail!("weight multipliers must be finite numbers");
        }
        FilterChain::from_names(&s.default_filters, s)?;
        WeigherChain::from_names(&s.default_weighers, s)?;
        self.rpc.version_cap()?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
