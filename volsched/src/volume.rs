/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Boundary to the volume services.
//!
//! Once a host is chosen the scheduler hands the work to the volume service
//! on that host ([`VolumeRpc`]) and records failures on the volume itself
//! ([`VolumeStore`]); callers watch the volume status, never a reply.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::request::{FilterProperties, RequestSpec};
use crate::rpc::{Envelope, RpcError, RpcVersion, Transport};

/// Version of the volume-service API this scheduler sends.
pub const VOLUME_RPC_VERSION: RpcVersion = RpcVersion::new(1, 0);

/// Topic the volume service on `host` consumes.
pub fn volume_topic(host: &str) -> String {
    format!("volume.{host}")
}

/// Scheduler operation a volume status refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CreateVolume,
    MigrateVolumeToHost,
    Retype,
    ManageExisting,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::CreateVolume => "create_volume",
            Operation::MigrateVolumeToHost => "migrate_volume_to_host",
            Operation::Retype => "retype",
            Operation::ManageExisting => "manage_existing",
        })
    }
}

// ── Volume-side payloads ──────────────────────────────────────────────────────

/// Provision a volume on the chosen host.
///
/// `filter_properties` travels along so that, if provisioning fails and
/// `allow_reschedule` is set, the volume service can record the failure and
/// cast `create_volume` back to the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeCreateArgs {
    pub volume_id: String,
    pub host: String,
    pub request_spec: RequestSpec,
    #[serde(default)]
    pub filter_properties: FilterProperties,
    #[serde(default)]
    pub allow_reschedule: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeMigrateArgs {
    pub volume_id: String,
    /// Host the volume lives on now.
    pub host: String,
    pub dest_host: String,
    #[serde(default)]
    pub force_host_copy: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeRetypeArgs {
    pub volume_id: String,
    /// Host the volume lives on now; it performs the retype.
    pub host: String,
    /// Where the volume ends up; equal to `host` when no migration is needed.
    pub dest_host: String,
    pub request_spec: RequestSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeManageArgs {
    pub volume_id: String,
    pub host: String,
    pub request_spec: RequestSpec,
}

// ── VolumeRpc ─────────────────────────────────────────────────────────────────

/// Dispatch to the volume service on a host.
#[async_trait]
pub trait VolumeRpc: Send + Sync {
    async fn create_volume(&self, args: VolumeCreateArgs) -> Result<(), RpcError>;
    async fn migrate_volume(&self, args: VolumeMigrateArgs) -> Result<(), RpcError>;
    async fn retype(&self, args: VolumeRetypeArgs) -> Result<(), RpcError>;
    async fn manage_existing(&self, args: VolumeManageArgs) -> Result<(), RpcError>;
}

/// [`VolumeRpc`] over a [`Transport`], casting to `volume.<host>`.
pub struct VolumeRpcApi {
    transport: Arc<dyn Transport>,
}

impl VolumeRpcApi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn cast<A: Serialize + Sync>(&self, method: &str, host: &str, args: &A) -> Result<(), RpcError> {
        let envelope = Envelope::new(method, VOLUME_RPC_VERSION, args)?;
        let topic = volume_topic(host);
        debug!(method, topic = %topic, "dispatching to volume service");
        self.transport.cast(&topic, envelope).await
    }
}

#[async_trait]
impl VolumeRpc for VolumeRpcApi {
    async fn create_volume(&self, args: VolumeCreateArgs) -> Result<(), RpcError> {
        self.cast("create_volume", &args.host, &args).await
    }

    async fn migrate_volume(&self, args: VolumeMigrateArgs) -> Result<(), RpcError> {
        self.cast("migrate_volume", &args.host, &args).await
    }

    async fn retype(&self, args: VolumeRetypeArgs) -> Result<(), RpcError> {
        self.cast("retype", &args.host, &args).await
    }

    async fn manage_existing(&self, args: VolumeManageArgs) -> Result<(), RpcError> {
        self.cast("manage_existing", &args.host, &args).await
    }
}

// ── VolumeStore ───────────────────────────────────────────────────────────────

/// What the scheduler last recorded about a volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeStatus {
    /// Handed to `host` for `operation`.
    Dispatched { operation: Operation, host: String },
    /// `operation` failed in the scheduler.
    Error { operation: Operation, reason: String },
}

/// Volume status persistence as far as the scheduler touches it.
#[async_trait]
pub trait VolumeStore: Send + Sync {
    /// Put the volume into error with a human-readable reason.
    async fn set_error(&self, volume_id: &str, operation: Operation, reason: &str);

    /// Record that the volume was handed to `host`.
    async fn set_dispatched(&self, volume_id: &str, operation: Operation, host: &str);
}

#[derive(Debug, Default)]
pub struct InMemoryVolumeStore {
    statuses: Mutex<HashMap<String, VolumeStatus>>,
}

impl InMemoryVolumeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, volume_id: &str) -> Option<VolumeStatus> {
        self.statuses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(volume_id)
            .cloned()
    }

    fn set(&self, volume_id: &str, status: VolumeStatus) {
        self.statuses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(volume_id.to_string(), status);
    }
}

#[async_trait]
impl VolumeStore for InMemoryVolumeStore {
    async fn set_error(&self, volume_id: &str, operation: Operation, reason: &str) {
        warn!(volume_id, %operation, reason, "volume set to error");
        self.set(
            volume_id,
            VolumeStatus::Error {
                operation,
                reason: reason.to_string(),
            },
        );
    }

    async fn set_dispatched(&self, volume_id: &str, operation: Operation, host: &str) {
        self.set(
            volume_id,
            VolumeStatus::Dispatched {
                operation,
                host: host.to_string(),
            },
        );
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::LocalTransport;

    #[tokio::test]
    async fn dispatch_goes_to_the_host_topic() {
        let transport = Arc::new(LocalTransport::new());
        let mut host3 = transport.subscribe("volume.host3");
        let rpc = VolumeRpcApi::new(transport.clone());

        rpc.create_volume(VolumeCreateArgs {
            volume_id: "vol-1".into(),
            host: "host3".into(),
            request_spec: RequestSpec::new("vol-1", 10),
            filter_properties: FilterProperties::default(),
            allow_reschedule: true,
            snapshot_id: None,
            image_id: None,
        })
        .await
        .unwrap();

        let env = host3.recv().await.unwrap();
        assert_eq!(env.method, "create_volume");
        assert_eq!(env.version, VOLUME_RPC_VERSION);
        let args: VolumeCreateArgs = env.decode_args().unwrap();
        assert!(args.allow_reschedule);
    }

    #[tokio::test]
    async fn dispatch_to_unknown_host_fails() {
        let rpc = VolumeRpcApi::new(Arc::new(LocalTransport::new()));
        let err = rpc
            .manage_existing(VolumeManageArgs {
                volume_id: "vol-1".into(),
                host: "ghost".into(),
                request_spec: RequestSpec::new("vol-1", 1),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Transport { .. }));
    }

    #[tokio::test]
    async fn store_keeps_the_latest_status() {
        let store = InMemoryVolumeStore::new();
        assert!(store.status("vol-1").is_none());

        store.set_dispatched("vol-1", Operation::CreateVolume, "host1").await;
        store.set_error("vol-1", Operation::CreateVolume, "No valid host was found.").await;
        assert_eq!(
            store.status("vol-1"),
            Some(VolumeStatus::Error {
                operation: Operation::CreateVolume,
                reason: "No valid host was found.".into()
            })
        );
    }
}
