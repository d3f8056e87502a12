/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Scheduling request data structures.
//!
//! ```text
//! volume API ──(RPC args)──►  RequestSpec + FilterProperties  ──►  filters / weighers
//!                               ↑ immutable                  ↑ side channel, only
//!                                                              retry history grows
//! ```
//!
//! # Ownership model
//! One `RequestSpec` / `FilterProperties` pair is built per scheduling call.
//! Filters and weighers receive shared references; the only mutation allowed
//! is appending to the retry history (done by the scheduler when it counts an
//! attempt and by the provisioning side when it reports a failure).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::filters::extra_specs_ops::Requirement;

// ── RequestSpec ───────────────────────────────────────────────────────────────

/// Volume type attached to a request, carrying its extra specs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeType {
    pub name: String,

    /// Raw `key → requirement` strings, parsed by the capabilities filter.
    #[serde(default)]
    pub extra_specs: BTreeMap<String, String>,
}

/// The structured description of what is being scheduled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestSpec {
    pub volume_id: String,

    /// Requested size in GB.
    pub size_gb: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<VolumeType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_volid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,

    /// Zone the caller asked for.  `None` means any zone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,

    /// Host an existing volume currently lives on (retype, manage-existing).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl RequestSpec {
    pub fn new(volume_id: impl Into<String>, size_gb: u64) -> Self {
        Self {
            volume_id: volume_id.into(),
            size_gb,
            ..Default::default()
        }
    }

    pub fn with_volume_type(mut self, volume_type: VolumeType) -> Self {
        self.volume_type = Some(volume_type);
        self
    }

    pub fn with_availability_zone(mut self, zone: impl Into<String>) -> Self {
        self.availability_zone = Some(zone.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Extra specs of the attached volume type, empty when there is none.
    pub fn extra_specs(&self) -> impl Iterator<Item = (&String, &String)> {
        self.volume_type
            .iter()
            .flat_map(|vt| vt.extra_specs.iter())
    }
}

// ── Scheduler hints ───────────────────────────────────────────────────────────

/// Value of a scheduler hint.
///
/// Hints arrive as JSON scalars.  Strings that start with an operator token
/// (see [`extra_specs_ops`](crate::filters::extra_specs_ops)) are parsed into
/// a [`Requirement`] once, at deserialisation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawHint", into = "RawHint")]
pub enum HintValue {
    Text(String),
    Number(f64),
    Expr(Requirement),
}

impl HintValue {
    /// The requirement this hint imposes on a capability.
    pub fn to_requirement(&self) -> Requirement {
        match self {
            HintValue::Text(s) => Requirement::parse(s),
            HintValue::Number(n) => Requirement::numeric_eq(*n),
            HintValue::Expr(r) => r.clone(),
        }
    }
}

impl From<&str> for HintValue {
    fn from(s: &str) -> Self {
        HintValue::from(RawHint::Text(s.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawHint {
    Number(f64),
    Text(String),
}

impl From<RawHint> for HintValue {
    fn from(raw: RawHint) -> Self {
        match raw {
            RawHint::Number(n) => HintValue::Number(n),
            RawHint::Text(s) if Requirement::is_expression(&s) => {
                HintValue::Expr(Requirement::parse(&s))
            }
            RawHint::Text(s) => HintValue::Text(s),
        }
    }
}

impl From<HintValue> for RawHint {
    fn from(h: HintValue) -> Self {
        match h {
            HintValue::Text(s) => RawHint::Text(s),
            HintValue::Number(n) => RawHint::Number(n),
            HintValue::Expr(r) => RawHint::Text(r.to_string()),
        }
    }
}

// ── Retry history ─────────────────────────────────────────────────────────────

/// One failed placement attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetriedHost {
    pub host: String,
    #[serde(default)]
    pub reason: String,
}

/// Attempt counter and the hosts that already failed this request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryInfo {
    pub num_attempts: u32,
    #[serde(default)]
    pub hosts: Vec<RetriedHost>,
}

// ── Migration policy ──────────────────────────────────────────────────────────

/// Whether a retype may move the volume to another host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MigrationPolicy {
    #[default]
    Never,
    OnDemand,
}

// ── FilterProperties ──────────────────────────────────────────────────────────

/// Side channel of hints and retry history that accompanies a [`RequestSpec`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterProperties {
    #[serde(default)]
    pub scheduler_hints: BTreeMap<String, HintValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryInfo>,

    /// Host the volume already occupies; the capacity filter waives its check
    /// for this host (retype keeps the data in place).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vol_exists_on: Option<String>,

    #[serde(default)]
    pub migration_policy: MigrationPolicy,
}

impl FilterProperties {
    /// Append a failed attempt on `host` to the retry history.
    pub fn record_failure(&mut self, host: impl Into<String>, reason: impl Into<String>) {
        self.retry.get_or_insert_with(RetryInfo::default).hosts.push(RetriedHost {
            host: host.into(),
            reason: reason.into(),
        });
    }

    /// `true` if `host` already failed this request.
    pub fn was_attempted(&self, host: &str) -> bool {
        self.retry
            .as_ref()
            .is_some_and(|r| r.hosts.iter().any(|h| h.host == host))
    }

    pub fn num_attempts(&self) -> u32 {
        self.retry.as_ref().map_or(0, |r| r.num_attempts)
    }

    /// Most recent failure reason, if any.
    pub fn last_failure(&self) -> Option<&RetriedHost> {
        self.retry.as_ref().and_then(|r| r.hosts.last())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
