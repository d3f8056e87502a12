/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Client facade for the scheduler RPC API.
//!
//! [`SchedulerApi`] negotiates one version at construction and then, per
//! call:
//!
//! 1. fails fast with [`RpcError::VersionMismatch`] if the method needs a
//!    newer version than negotiated (nothing is sent),
//! 2. stamps the message with the highest version both the peer and the
//!    method's payload support,
//! 3. drops payload fields newer than that stamp,
//! 4. casts (or fans out) the envelope.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::envelope::{
    CapabilityUpdateArgs, CreateVolumeArgs, Envelope, ManageExistingArgs, Method,
    MigrateVolumeArgs, RetypeArgs,
};
use super::error::RpcError;
use super::transport::Transport;
use super::version::{RpcVersion, RPC_API_VERSION};

pub struct SchedulerApi {
    transport: Arc<dyn Transport>,
    topic: String,
    version: RpcVersion,
}

impl SchedulerApi {
    /// `version_cap` is the highest version the remote scheduler speaks;
    /// `None` means it is as new as this build.
    pub fn new(
        transport: Arc<dyn Transport>,
        topic: impl Into<String>,
        version_cap: Option<RpcVersion>,
    ) -> Self {
        let version = match version_cap {
            None => RPC_API_VERSION,
            Some(cap) if cap.major == RPC_API_VERSION.major => cap.min(RPC_API_VERSION),
            Some(cap) => {
                warn!(%cap, local = %RPC_API_VERSION, "peer speaks another major version; every call will be refused");
                cap
            }
        };
        info!(negotiated = %version, cap = ?version_cap.map(|v| v.to_string()), "scheduler RPC version");
        Self {
            transport,
            topic: topic.into(),
            version,
        }
    }

    pub fn negotiated_version(&self) -> RpcVersion {
        self.version
    }

    /// Version to stamp `method` with, or the reason it cannot be sent.
    fn prepare(&self, method: Method) -> Result<RpcVersion, RpcError> {
        let required = method.min_version();
        if !RpcVersion::can_send(required, self.version) {
            return Err(RpcError::VersionMismatch {
                method: method.as_str(),
                required,
                cap: self.version,
            });
        }
        Ok(self.version.min(method.latest_version()))
    }

    async fn cast<A: serde::Serialize>(&self, method: Method, version: RpcVersion, args: &A) -> Result<(), RpcError> {
        let envelope = Envelope::new(method.as_str(), version, args)?;
        debug!(method = %method, version = %version, topic = %self.topic, "cast");
        self.transport.cast(&self.topic, envelope).await
    }

    pub async fn create_volume(&self, args: CreateVolumeArgs) -> Result<(), RpcError> {
        let version = self.prepare(Method::CreateVolume)?;
        let args = args.downgrade_to(version);
        self.cast(Method::CreateVolume, version, &args).await
    }

    pub async fn migrate_volume_to_host(&self, args: MigrateVolumeArgs) -> Result<(), RpcError> {
        let version = self.prepare(Method::MigrateVolumeToHost)?;
        self.cast(Method::MigrateVolumeToHost, version, &args).await
    }

    pub async fn retype(&self, args: RetypeArgs) -> Result<(), RpcError> {
        let version = self.prepare(Method::Retype)?;
        self.cast(Method::Retype, version, &args).await
    }

    pub async fn manage_existing(&self, args: ManageExistingArgs) -> Result<(), RpcError> {
        let version = self.prepare(Method::ManageExisting)?;
        self.cast(Method::ManageExisting, version, &args).await
    }

    /// Broadcast a capability report to every scheduler.  No reply, no
    /// retry.
    pub async fn update_service_capabilities(&self, args: CapabilityUpdateArgs) -> Result<(), RpcError> {
        let version = self.prepare(Method::UpdateServiceCapabilities)?;
        let envelope = Envelope::new(Method::UpdateServiceCapabilities.as_str(), version, &args)?;
        self.transport.fanout_cast(&self.topic, envelope).await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
