/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Scheduler manager: consumes scheduler casts and acts on them.
//!
//! | Method | Flow |
//! |---|---|
//! | `update_service_capabilities` | registry ← report |
//! | `create_volume` | schedule → charge host → volume service `create_volume` |
//! | `migrate_volume_to_host` | named host must pass filters → `migrate_volume` |
//! | `retype` | current host if it still fits, else migrate per policy → `retype` |
//! | `manage_existing` | volume's host must pass filters → `manage_existing` |
//!
//! Any failure in a volume operation puts the volume into error with the
//! reason; nothing propagates to the sender, which only watches status.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::context::SchedulerContext;
use crate::request::RequestSpec;
use crate::rpc::{
    CapabilityUpdateArgs, CreateVolumeArgs, Envelope, ManageExistingArgs, Method,
    MigrateVolumeArgs, RetypeArgs, RpcError, RPC_API_VERSION,
};
use crate::scheduler::SchedulerError;
use crate::volume::{
    Operation, VolumeCreateArgs, VolumeManageArgs, VolumeMigrateArgs, VolumeRetypeArgs, VolumeRpc,
    VolumeStore,
};

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

pub struct SchedulerManager {
    ctx: Arc<SchedulerContext>,
    volume_rpc: Arc<dyn VolumeRpc>,
    volumes: Arc<dyn VolumeStore>,
}

impl SchedulerManager {
    pub fn new(
        ctx: Arc<SchedulerContext>,
        volume_rpc: Arc<dyn VolumeRpc>,
        volumes: Arc<dyn VolumeStore>,
    ) -> Self {
        Self {
            ctx,
            volume_rpc,
            volumes,
        }
    }

    /// Consume envelopes until `rx` closes, one task per envelope, then wait
    /// for the in-flight ones.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<Envelope>) {
        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                next = rx.recv() => match next {
                    Some(envelope) => {
                        let this = Arc::clone(&self);
                        tasks.spawn(async move {
                            let method = envelope.method.clone();
                            if let Err(e) = this.handle(envelope).await {
                                warn!(method = %method, error = %e, "request failed");
                            }
                        });
                    }
                    None => break,
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "request task panicked");
                    }
                }
            }
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "request task panicked");
            }
        }
        info!("scheduler manager stopped");
    }

    /// Handle one envelope to completion.
    pub async fn handle(&self, envelope: Envelope) -> Result<(), ManagerError> {
        envelope.check_supported(RPC_API_VERSION)?;
        let method = envelope.scheduler_method()?;
        debug!(%method, version = %envelope.version, "handling request");

        match method {
            Method::UpdateServiceCapabilities => {
                let args: CapabilityUpdateArgs = envelope.decode_args()?;
                self.ctx
                    .registry()
                    .update_capabilities(&args.service_name, &args.host, &args.capabilities);
                Ok(())
            }
            Method::CreateVolume => self.create_volume(envelope.decode_args()?).await,
            Method::MigrateVolumeToHost => self.migrate_volume_to_host(envelope.decode_args()?).await,
            Method::Retype => self.retype(envelope.decode_args()?).await,
            Method::ManageExisting => self.manage_existing(envelope.decode_args()?).await,
        }
    }

    // ── Operations ────────────────────────────────────────────────────────────

    async fn create_volume(&self, args: CreateVolumeArgs) -> Result<(), ManagerError> {
        let op = Operation::CreateVolume;
        let spec = with_volume_id(args.request_spec, &args.volume_id);
        let mut props = args.filter_properties.unwrap_or_default();
        let scheduler = self.ctx.scheduler();

        let chosen = match scheduler.schedule(&spec, &mut props).await {
            Ok(chosen) => chosen,
            Err(e) => return self.fail(&args.volume_id, op, e.into()).await,
        };
        let host = chosen.host.host.clone();
        self.ctx.registry().consume_from_volume(&host, spec.size_gb);

        let call = VolumeCreateArgs {
            volume_id: args.volume_id.clone(),
            host: host.clone(),
            request_spec: spec,
            filter_properties: props,
            allow_reschedule: scheduler.max_attempts() > 1,
            snapshot_id: args.snapshot_id,
            image_id: args.image_id,
        };
        self.dispatch(&args.volume_id, op, &host, self.volume_rpc.create_volume(call).await)
            .await
    }

    async fn migrate_volume_to_host(&self, args: MigrateVolumeArgs) -> Result<(), ManagerError> {
        let op = Operation::MigrateVolumeToHost;
        let spec = with_volume_id(args.request_spec, &args.volume_id);
        let current = match current_host(&spec) {
            Ok(h) => h,
            Err(e) => return self.fail(&args.volume_id, op, e.into()).await,
        };
        if let Err(e) = self
            .ctx
            .scheduler()
            .host_passes_filters(&args.host, &spec, &args.filter_properties)
            .await
        {
            return self.fail(&args.volume_id, op, e.into()).await;
        }

        let call = VolumeMigrateArgs {
            volume_id: args.volume_id.clone(),
            host: current,
            dest_host: args.host.clone(),
            force_host_copy: args.force_host_copy,
        };
        self.dispatch(&args.volume_id, op, &args.host, self.volume_rpc.migrate_volume(call).await)
            .await
    }

    async fn retype(&self, args: RetypeArgs) -> Result<(), ManagerError> {
        let op = Operation::Retype;
        let spec = with_volume_id(args.request_spec, &args.volume_id);
        let current = match current_host(&spec) {
            Ok(h) => h,
            Err(e) => return self.fail(&args.volume_id, op, e.into()).await,
        };
        let chosen = match self
            .ctx
            .scheduler()
            .find_retype_host(&spec, &args.filter_properties, &current)
            .await
        {
            Ok(chosen) => chosen,
            Err(e) => return self.fail(&args.volume_id, op, e.into()).await,
        };

        let dest = chosen.host.host.clone();
        let call = VolumeRetypeArgs {
            volume_id: args.volume_id.clone(),
            host: current,
            dest_host: dest.clone(),
            request_spec: spec,
        };
        self.dispatch(&args.volume_id, op, &dest, self.volume_rpc.retype(call).await)
            .await
    }

    async fn manage_existing(&self, args: ManageExistingArgs) -> Result<(), ManagerError> {
        let op = Operation::ManageExisting;
        let spec = with_volume_id(args.request_spec, &args.volume_id);
        let host = match current_host(&spec) {
            Ok(h) => h,
            Err(e) => return self.fail(&args.volume_id, op, e.into()).await,
        };
        if let Err(e) = self
            .ctx
            .scheduler()
            .host_passes_filters(&host, &spec, &args.filter_properties)
            .await
        {
            return self.fail(&args.volume_id, op, e.into()).await;
        }

        let call = VolumeManageArgs {
            volume_id: args.volume_id.clone(),
            host: host.clone(),
            request_spec: spec,
        };
        self.dispatch(&args.volume_id, op, &host, self.volume_rpc.manage_existing(call).await)
            .await
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    async fn dispatch(
        &self,
        volume_id: &str,
        op: Operation,
        host: &str,
        sent: Result<(), RpcError>,
    ) -> Result<(), ManagerError> {
        match sent {
            Ok(()) => {
                info!(volume_id, %op, host, "dispatched to volume service");
                self.volumes.set_dispatched(volume_id, op, host).await;
                Ok(())
            }
            Err(e) => self.fail(volume_id, op, e.into()).await,
        }
    }

    async fn fail(&self, volume_id: &str, op: Operation, err: ManagerError) -> Result<(), ManagerError> {
        self.volumes.set_error(volume_id, op, &err.to_string()).await;
        Err(err)
    }
}

/// The envelope's `volume_id` is authoritative.
fn with_volume_id(mut spec: RequestSpec, volume_id: &str) -> RequestSpec {
    if spec.volume_id != volume_id {
        spec.volume_id = volume_id.to_string();
    }
    spec
}

fn current_host(spec: &RequestSpec) -> Result<String, SchedulerError> {
    spec.host.clone().ok_or_else(|| SchedulerError::InvalidRequest {
        volume_id: spec.volume_id.clone(),
        reason: "request_spec.host is required".to_string(),
    })
}


// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;
    use crate::host_manager::fixtures;
    use crate::host_state::Capacity;
    use crate::request::{FilterProperties, MigrationPolicy, VolumeType};
    use crate::rpc::RpcVersion;
    use crate::volume::{InMemoryVolumeStore, VolumeStatus};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every dispatch as `(method, host, dest)`.
    #[derive(Default)]
    struct RecordingVolumeRpc {
        calls: Mutex<Vec<(&'static str, String, String)>>,
        unreachable: bool,
    }

    impl RecordingVolumeRpc {
        fn record(&self, method: &'static str, host: &str, dest: &str) -> Result<(), RpcError> {
            if self.unreachable {
                return Err(RpcError::transport(&format!("volume.{host}"), "no consumer"));
            }
            self.calls
                .lock()
                .unwrap()
                .push((method, host.to_string(), dest.to_string()));
            Ok(())
        }

        fn calls(&self) -> Vec<(&'static str, String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VolumeRpc for RecordingVolumeRpc {
        async fn create_volume(&self, args: VolumeCreateArgs) -> Result<(), RpcError> {
            self.record("create_volume", &args.host, &args.host)
        }
        async fn migrate_volume(&self, args: VolumeMigrateArgs) -> Result<(), RpcError> {
            self.record("migrate_volume", &args.host, &args.dest_host)
        }
        async fn retype(&self, args: VolumeRetypeArgs) -> Result<(), RpcError> {
            self.record("retype", &args.host, &args.dest_host)
        }
        async fn manage_existing(&self, args: VolumeManageArgs) -> Result<(), RpcError> {
            self.record("manage_existing", &args.host, &args.host)
        }
    }

    struct Harness {
        manager: Arc<SchedulerManager>,
        ctx: Arc<SchedulerContext>,
        rpc: Arc<RecordingVolumeRpc>,
        store: Arc<InMemoryVolumeStore>,
    }

    async fn harness_with(rpc: RecordingVolumeRpc) -> Harness {
        let ctx = Arc::new(
            SchedulerContext::new(SchedulerConfig::default(), fixtures::fleet_directory()).unwrap(),
        );
        let rpc = Arc::new(rpc);
        let store = Arc::new(InMemoryVolumeStore::new());
        let manager = Arc::new(SchedulerManager::new(ctx.clone(), rpc.clone(), store.clone()));

        for report in fixtures::fleet_reports(fixtures::epoch()) {
            let env = envelope(
                Method::UpdateServiceCapabilities,
                &CapabilityUpdateArgs {
                    service_name: "volume".into(),
                    host: report.host.clone(),
                    capabilities: report,
                },
            );
            manager.handle(env).await.unwrap();
        }
        Harness {
            manager,
            ctx,
            rpc,
            store,
        }
    }

    async fn harness() -> Harness {
        harness_with(RecordingVolumeRpc::default()).await
    }

    fn envelope<A: serde::Serialize>(method: Method, args: &A) -> Envelope {
        Envelope::new(method.as_str(), method.latest_version(), args).unwrap()
    }

    fn create(volume_id: &str, size_gb: u64) -> Envelope {
        envelope(
            Method::CreateVolume,
            &CreateVolumeArgs {
                volume_id: volume_id.into(),
                snapshot_id: None,
                request_spec: RequestSpec::new(volume_id, size_gb),
                image_id: None,
                filter_properties: None,
            },
        )
    }

    fn error_reason(store: &InMemoryVolumeStore, volume_id: &str) -> String {
        match store.status(volume_id) {
            Some(VolumeStatus::Error { reason, .. }) => reason,
            other => panic!("expected error status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn capability_updates_fill_the_registry() {
        let h = harness().await;
        assert_eq!(h.ctx.registry().len(), 4);
    }

    #[tokio::test]
    async fn create_volume_dispatches_to_the_best_host() {
        let h = harness().await;
        h.manager.handle(create("vol-1", 250)).await.unwrap();

        assert_eq!(h.rpc.calls(), vec![("create_volume", "host1".into(), "host1".into())]);
        assert_eq!(
            h.store.status("vol-1"),
            Some(VolumeStatus::Dispatched {
                operation: Operation::CreateVolume,
                host: "host1".into()
            })
        );
        assert_eq!(
            h.ctx.registry().host_state("host1").unwrap().free_capacity_gb,
            Capacity::Known(774.0)
        );
    }

    #[tokio::test]
    async fn consumed_capacity_steers_the_next_placement() {
        let h = harness().await;
        // host1 usable 921.6 → 671.6 → 421.6 → 171.6; host3 (256) then wins.
        for n in 0..4 {
            h.manager.handle(create(&format!("vol-{n}"), 250)).await.unwrap();
        }
        let hosts: Vec<String> = h.rpc.calls().into_iter().map(|(_, host, _)| host).collect();
        assert_eq!(hosts, vec!["host1", "host1", "host1", "host3"]);
    }

    #[tokio::test]
    async fn no_valid_host_puts_volume_in_error() {
        let h = harness().await;
        let err = h.manager.handle(create("vol-big", 5000)).await.unwrap_err();
        assert!(matches!(err, ManagerError::Scheduler(SchedulerError::NoValidHost { .. })));
        assert!(error_reason(&h.store, "vol-big").starts_with("No valid host was found."));
        assert!(h.rpc.calls().is_empty());
    }

    #[tokio::test]
    async fn unreachable_volume_service_puts_volume_in_error() {
        let h = harness_with(RecordingVolumeRpc {
            unreachable: true,
            ..Default::default()
        })
        .await;
        assert!(h.manager.handle(create("vol-1", 10)).await.is_err());
        assert!(error_reason(&h.store, "vol-1").contains("volume.host1"));
    }

    #[tokio::test]
    async fn exhausted_retries_put_volume_in_error() {
        let h = harness().await;
        let mut props = FilterProperties::default();
        props.retry = Some(crate::request::RetryInfo {
            num_attempts: 3,
            hosts: vec![],
        });
        props.record_failure("host3", "iscsi timeout");
        let env = envelope(
            Method::CreateVolume,
            &CreateVolumeArgs {
                volume_id: "vol-r".into(),
                snapshot_id: None,
                request_spec: RequestSpec::new("vol-r", 10),
                image_id: None,
                filter_properties: Some(props),
            },
        );
        h.manager.handle(env).await.unwrap_err();
        assert!(error_reason(&h.store, "vol-r").contains("host3: iscsi timeout"));
    }

    #[tokio::test]
    async fn migrate_checks_destination() {
        let h = harness().await;
        let migrate = |dest: &str, size: u64| {
            envelope(
                Method::MigrateVolumeToHost,
                &MigrateVolumeArgs {
                    volume_id: "vol-m".into(),
                    host: dest.into(),
                    force_host_copy: false,
                    request_spec: RequestSpec::new("vol-m", size).with_host("host1"),
                    filter_properties: FilterProperties::default(),
                },
            )
        };

        assert!(h.manager.handle(migrate("host3", 300)).await.is_err());
        h.manager.handle(migrate("host3", 100)).await.unwrap();
        assert_eq!(
            h.rpc.calls(),
            vec![("migrate_volume", "host1".into(), "host3".into())]
        );
    }

    #[tokio::test]
    async fn retype_stays_or_moves() {
        let h = harness().await;
        let retype = |tier: &str, policy: MigrationPolicy| {
            let mut vt = VolumeType {
                name: tier.into(),
                ..Default::default()
            };
            vt.extra_specs.insert("tier".into(), tier.into());
            envelope(
                Method::Retype,
                &RetypeArgs {
                    volume_id: "vol-t".into(),
                    request_spec: RequestSpec::new("vol-t", 100)
                        .with_volume_type(vt)
                        .with_host("host3"),
                    filter_properties: FilterProperties {
                        migration_policy: policy,
                        ..Default::default()
                    },
                },
            )
        };

        h.manager.handle(retype("bronze", MigrationPolicy::Never)).await.unwrap();
        assert!(h.manager.handle(retype("gold", MigrationPolicy::Never)).await.is_err());
        h.manager.handle(retype("gold", MigrationPolicy::OnDemand)).await.unwrap();

        assert_eq!(
            h.rpc.calls(),
            vec![
                ("retype", "host3".into(), "host3".into()),
                ("retype", "host3".into(), "host1".into()),
            ]
        );
    }

    #[tokio::test]
    async fn manage_existing_requires_a_host() {
        let h = harness().await;
        let manage = |spec: RequestSpec| {
            envelope(
                Method::ManageExisting,
                &ManageExistingArgs {
                    volume_id: "vol-x".into(),
                    request_spec: spec,
                    filter_properties: FilterProperties::default(),
                },
            )
        };

        let err = h.manager.handle(manage(RequestSpec::new("vol-x", 5))).await.unwrap_err();
        assert!(matches!(err, ManagerError::Scheduler(SchedulerError::InvalidRequest { .. })));

        h.manager
            .handle(manage(RequestSpec::new("vol-x", 5).with_host("host2")))
            .await
            .unwrap();
        assert_eq!(h.rpc.calls(), vec![("manage_existing", "host2".into(), "host2".into())]);
    }

    #[tokio::test]
    async fn newer_envelope_is_refused_without_touching_volumes() {
        let h = harness().await;
        let mut env = create("vol-n", 1);
        env.version = RpcVersion::new(1, 9);
        let err = h.manager.handle(env).await.unwrap_err();
        assert!(matches!(err, ManagerError::Rpc(RpcError::UnsupportedVersion { .. })));
        assert!(h.store.status("vol-n").is_none());
    }

    #[tokio::test]
    async fn run_drains_the_queue_before_returning() {
        let h = harness().await;
        let (tx, rx) = mpsc::channel(8);
        let loop_handle = tokio::spawn(h.manager.clone().run(rx));

        for n in 0..3 {
            tx.send(create(&format!("vol-{n}"), 10)).await.unwrap();
        }
        tx.send(create("vol-huge", 9999)).await.unwrap();
        drop(tx);
        loop_handle.await.unwrap();

        assert_eq!(h.rpc.calls().len(), 3);
        assert!(matches!(
            h.store.status("vol-huge"),
            Some(VolumeStatus::Error { .. })
        ));
    }
}
