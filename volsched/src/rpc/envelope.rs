/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Versioned message envelope and the per-method argument payloads.
//!
//! On the wire every call is
//! ```json
//! {"method": "create_volume", "version": "1.2", "args": {...}}
//! ```
//! `args` holds only JSON primitives, objects and arrays, so either side can
//! be upgraded without the other understanding its Rust types.  Fields newer
//! than the stamped version are simply absent.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::RpcError;
use super::version::RpcVersion;
use crate::host_state::CapabilityReport;
use crate::request::{FilterProperties, RequestSpec};

// ── Methods ───────────────────────────────────────────────────────────────────

/// Scheduler RPC methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    UpdateServiceCapabilities,
    CreateVolume,
    MigrateVolumeToHost,
    Retype,
    ManageExisting,
}

impl Method {
    pub const ALL: [Method; 5] = [
        Method::UpdateServiceCapabilities,
        Method::CreateVolume,
        Method::MigrateVolumeToHost,
        Method::Retype,
        Method::ManageExisting,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Method::UpdateServiceCapabilities => "update_service_capabilities",
            Method::CreateVolume => "create_volume",
            Method::MigrateVolumeToHost => "migrate_volume_to_host",
            Method::Retype => "retype",
            Method::ManageExisting => "manage_existing",
        }
    }

    /// Lowest version a peer must speak to receive this method at all.
    pub fn min_version(self) -> RpcVersion {
        match self {
            Method::UpdateServiceCapabilities | Method::CreateVolume => RpcVersion::new(1, 0),
            Method::MigrateVolumeToHost => RpcVersion::new(1, 3),
            Method::Retype => RpcVersion::new(1, 4),
            Method::ManageExisting => RpcVersion::new(1, 5),
        }
    }

    /// Version that carries the method's complete argument set.
    pub fn latest_version(self) -> RpcVersion {
        match self {
            Method::CreateVolume => RpcVersion::new(1, 2),
            other => other.min_version(),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = RpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| RpcError::UnknownMethod(s.to_string()))
    }
}

// ── Envelope ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub method: String,
    pub version: RpcVersion,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl Envelope {
    /// Wrap `args`, which must serialise to a JSON object.
    pub fn new<A: Serialize>(method: &str, version: RpcVersion, args: &A) -> Result<Self, RpcError> {
        let encode_err = |source| RpcError::Encode {
            method: method.to_string(),
            source,
        };
        match serde_json::to_value(args).map_err(encode_err)? {
            Value::Object(args) => Ok(Self {
                method: method.to_string(),
                version,
                args,
            }),
            other => Err(encode_err(<serde_json::Error as serde::ser::Error>::custom(
                format!("arguments must be a JSON object, got {other}"),
            ))),
        }
    }

    pub fn decode_args<A: DeserializeOwned>(&self) -> Result<A, RpcError> {
        serde_json::from_value(Value::Object(self.args.clone())).map_err(|source| RpcError::Decode {
            method: self.method.clone(),
            source,
        })
    }

    /// The scheduler method this envelope names.
    pub fn scheduler_method(&self) -> Result<Method, RpcError> {
        self.method.parse()
    }

    /// Reject envelopes a receiver speaking `supported` cannot handle.
    pub fn check_supported(&self, supported: RpcVersion) -> Result<(), RpcError> {
        if supported.accepts(self.version) {
            Ok(())
        } else {
            Err(RpcError::UnsupportedVersion {
                received: self.version,
                supported,
            })
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, RpcError> {
        serde_json::to_vec(self).map_err(|source| RpcError::Encode {
            method: self.method.clone(),
            source,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RpcError> {
        serde_json::from_slice(bytes).map_err(|source| RpcError::Decode {
            method: "<envelope>".to_string(),
            source,
        })
    }
}

// ── Argument payloads ─────────────────────────────────────────────────────────

/// `update_service_capabilities` (1.0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityUpdateArgs {
    pub service_name: String,
    pub host: String,
    pub capabilities: CapabilityReport,
}

/// `create_volume`: 1.0 base, `image_id` from 1.1, `filter_properties`
/// from 1.2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateVolumeArgs {
    pub volume_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
    pub request_spec: RequestSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_properties: Option<FilterProperties>,
}

impl CreateVolumeArgs {
    /// Drop every field `version` does not know about.
    pub fn downgrade_to(mut self, version: RpcVersion) -> Self {
        if version < RpcVersion::new(1, 2) {
            self.filter_properties = None;
        }
        if version < RpcVersion::new(1, 1) {
            self.image_id = None;
        }
        self
    }
}

/// `migrate_volume_to_host` (1.3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrateVolumeArgs {
    pub volume_id: String,
    pub host: String,
    #[serde(default)]
    pub force_host_copy: bool,
    pub request_spec: RequestSpec,
    #[serde(default)]
    pub filter_properties: FilterProperties,
}

/// `retype` (1.4).  The volume's current host is `request_spec.host`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetypeArgs {
    pub volume_id: String,
    pub request_spec: RequestSpec,
    #[serde(default)]
    pub filter_properties: FilterProperties,
}

/// `manage_existing` (1.5).  The backend holding the volume is
/// `request_spec.host`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManageExistingArgs {
    pub volume_id: String,
    pub request_spec: RequestSpec,
    #[serde(default)]
    pub filter_properties: FilterProperties,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
