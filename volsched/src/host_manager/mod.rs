/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Host state registry: the scheduler's view of every volume backend.
//!
//! # Data flow
//! ```text
//! backends ──fanout──► update_capabilities()  ──►  states: host → Arc<HostState>
//!                                                         │
//! ServiceDirectory ──► get_all_host_states() ◄────────────┘
//!   (enabled, alive, zone)        │
//!                                 ▼
//!                      Vec<Arc<HostState>> snapshot for one scheduling call
//! ```
//!
//! # Consistency
//! Entries are replaced whole (copy-on-write through `Arc::make_mut`), so a
//! reader holding an `Arc<HostState>` never sees a half-applied report, and
//! scheduling never holds the lock while filtering.  The lock is a plain
//! `std::sync::RwLock`: it is never held across an `.await`.

pub mod directory;

#[cfg(test)]
pub(crate) mod fixtures;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::SchedulerSection;
use crate::host_state::{CapabilityReport, HostState};

pub use directory::{
    DirectoryError, FileServiceDirectory, ServiceDirectory, ServiceRecord, StaticServiceDirectory,
};

#[derive(Debug, Error)]
pub enum RegistryError {
    /// The directory failed and no earlier listing exists to fall back on.
    #[error("service directory unavailable and no previous snapshot: {0}")]
    ServiceDirectoryUnavailable(String),
}

/// What [`HostStateRegistry::update_capabilities`] did with a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// First report from this host.
    Created,
    /// Newer report replaced the stored one.
    Updated,
    /// Same timestamp as the stored report; nothing changed.
    Duplicate,
    /// Older than the stored report; dropped.
    Stale,
    /// Report came from a service outside the scheduler's topic.
    Ignored,
}

/// Thread-safe map of host name → latest capability snapshot.
pub struct HostStateRegistry {
    topic: String,
    directory: Arc<dyn ServiceDirectory>,
    service_down_time: Duration,
    sync_timeout: Duration,
    states: RwLock<HashMap<String, Arc<HostState>>>,
    last_good: Mutex<Option<Vec<ServiceRecord>>>,
}

impl std::fmt::Debug for HostStateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostStateRegistry")
            .field("topic", &self.topic)
            .field("hosts", &self.len())
            .finish()
    }
}

impl HostStateRegistry {
    pub fn new(section: &SchedulerSection, directory: Arc<dyn ServiceDirectory>) -> Self {
        Self {
            topic: section.topic.clone(),
            directory,
            service_down_time: section.service_down_time(),
            sync_timeout: section.directory_sync_timeout(),
            states: RwLock::new(HashMap::new()),
            last_good: Mutex::new(None),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Ingest one periodic capability report.
    ///
    /// The stored entry is replaced wholesale; reports are never merged.
    /// Applying the same report twice leaves the registry unchanged.
    pub fn update_capabilities(
        &self,
        service_name: &str,
        host: &str,
        report: &CapabilityReport,
    ) -> UpdateOutcome {
        if service_name != self.topic {
            debug!(service = service_name, host, "ignoring report from non-volume service");
            return UpdateOutcome::Ignored;
        }

        let mut states = self.states.write().unwrap_or_else(|e| e.into_inner());
        match states.get_mut(host) {
            Some(existing) if report.timestamp < existing.updated_at => {
                warn!(
                    host,
                    report_ts = %report.timestamp,
                    stored_ts = %existing.updated_at,
                    "dropping stale capability report"
                );
                UpdateOutcome::Stale
            }
            Some(existing) if report.timestamp == existing.updated_at => {
                debug!(host, "duplicate capability report");
                UpdateOutcome::Duplicate
            }
            Some(existing) => {
                Arc::make_mut(existing).replace_capabilities(report);
                debug!(host, free_gb = %report.free_capacity_gb, "capabilities updated");
                UpdateOutcome::Updated
            }
            None => {
                let mut state = HostState::from_report(report);
                state.host = host.to_string();
                states.insert(host.to_string(), Arc::new(state));
                info!(host, backend = %report.backend_name, "first capability report");
                UpdateOutcome::Created
            }
        }
    }

    /// Snapshot of every schedulable host, sorted by host name.
    ///
    /// A host is schedulable when the service directory lists it as enabled,
    /// its heartbeat is younger than `service_down_time`, and it has reported
    /// capabilities at least once.  The directory's availability zone is
    /// written into each entry.
    ///
    /// # Errors
    /// [`RegistryError::ServiceDirectoryUnavailable`] only when the directory
    /// fails (or exceeds `directory_sync_timeout`) and no earlier listing
    /// exists.  An empty fleet is `Ok(vec![])`.
    pub async fn get_all_host_states(&self) -> Result<Vec<Arc<HostState>>, RegistryError> {
        let records = self.sync_directory().await?;
        let now = Utc::now();

        let alive: BTreeMap<String, ServiceRecord> = records
            .into_iter()
            .filter(|r| {
                let up = self.is_up(r.last_heartbeat, now);
                if !up {
                    debug!(host = %r.host, heartbeat = %r.last_heartbeat, "service is down");
                }
                up
            })
            .map(|r| (r.host.clone(), r))
            .collect();

        let mut states = self.states.write().unwrap_or_else(|e| e.into_inner());
        let mut snapshot = Vec::with_capacity(alive.len());
        for (host, record) in alive {
            let Some(entry) = states.get_mut(&host) else {
                debug!(host = %host, "enabled service has not reported capabilities");
                continue;
            };
            if entry.availability_zone != record.availability_zone {
                Arc::make_mut(entry).availability_zone = record.availability_zone;
            }
            snapshot.push(Arc::clone(entry));
        }

        debug!(hosts = snapshot.len(), known = states.len(), "host states collected");
        Ok(snapshot)
    }

    /// Charge `size_gb` against `host` after a placement.  Returns `false`
    /// for an unknown host.
    pub fn consume_from_volume(&self, host: &str, size_gb: u64) -> bool {
        let mut states = self.states.write().unwrap_or_else(|e| e.into_inner());
        match states.get_mut(host) {
            Some(entry) => {
                Arc::make_mut(entry).consume_from_volume(size_gb as f64);
                true
            }
            None => false,
        }
    }

    /// Current snapshot of one host, whether or not it is schedulable.
    pub fn host_state(&self, host: &str) -> Option<Arc<HostState>> {
        self.states
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(host)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.states.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_up(&self, heartbeat: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        // A heartbeat from the future (clock skew) counts as alive.
        match (now - heartbeat).to_std() {
            Ok(age) => age <= self.service_down_time,
            Err(_) => true,
        }
    }

    /// Fresh directory listing, or the last good one when the directory
    /// fails or is slow.
    async fn sync_directory(&self) -> Result<Vec<ServiceRecord>, RegistryError> {
        let listing = self.directory.list_enabled_hosts(&self.topic);
        let failure = match tokio::time::timeout(self.sync_timeout, listing).await {
            Ok(Ok(records)) => {
                *self.last_good.lock().unwrap_or_else(|e| e.into_inner()) = Some(records.clone());
                return Ok(records);
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("no answer within {:?}", self.sync_timeout),
        };

        let snapshot = self.last_good.lock().unwrap_or_else(|e| e.into_inner()).clone();
        match snapshot {
            Some(records) => {
                warn!(error = %failure, "service directory sync failed; using last good snapshot");
                Ok(records)
            }
            None => {
                warn!(error = %failure, "service directory sync failed; no snapshot to fall back on");
                Err(RegistryError::ServiceDirectoryUnavailable(failure))
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
