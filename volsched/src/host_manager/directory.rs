/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Service directory: the authority on which volume services are enabled,
//! where they live, and whether they are alive.
//!
//! The registry consults a [`ServiceDirectory`] on every host-state query.
//! Two implementations are provided:
//!
//! * [`FileServiceDirectory`]: re-reads a YAML file on each call
//!   (production, operator-edited).
//! * [`StaticServiceDirectory`]: in-memory list (tests and embedding).
//!
//! Expected YAML structure:
//! ```yaml
//! services:
//!   - host: "host1"
//!     topic: "volume"
//!     availability_zone: "zone1"
//!     disabled: false
//!     last_heartbeat: "2026-01-01T00:00:00Z"   # optional, defaults to now
//! ```

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::host_state::DEFAULT_AVAILABILITY_ZONE;

fn default_zone() -> String {
    DEFAULT_AVAILABILITY_ZONE.to_string()
}

/// One enabled service as seen by the directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRecord {
    pub host: String,
    pub availability_zone: String,
    pub last_heartbeat: DateTime<Utc>,
}

impl ServiceRecord {
    pub fn new(host: impl Into<String>, zone: impl Into<String>, last_heartbeat: DateTime<Utc>) -> Self {
        Self {
            host: host.into(),
            availability_zone: zone.into(),
            last_heartbeat,
        }
    }
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("cannot read service directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed service directory {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("service directory unavailable: {0}")]
    Unavailable(String),
}

/// Source of truth for enabled services on a topic.
#[async_trait]
pub trait ServiceDirectory: Send + Sync {
    /// Enabled services registered under `topic`.
    async fn list_enabled_hosts(&self, topic: &str) -> Result<Vec<ServiceRecord>, DirectoryError>;
}

// ── FileServiceDirectory ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServiceFile {
    #[serde(default)]
    services: Vec<ServiceEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServiceEntry {
    host: String,
    topic: String,
    #[serde(default = "default_zone")]
    availability_zone: String,
    #[serde(default)]
    disabled: bool,
    #[serde(default)]
    last_heartbeat: Option<DateTime<Utc>>,
}

/// YAML-backed directory, re-read on every call so operator edits apply
/// without a restart.
#[derive(Debug, Clone)]
pub struct FileServiceDirectory {
    path: PathBuf,
}

impl FileServiceDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ServiceDirectory for FileServiceDirectory {
    async fn list_enabled_hosts(&self, topic: &str) -> Result<Vec<ServiceRecord>, DirectoryError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| DirectoryError::Io {
                path: self.path.clone(),
                source,
            })?;

        let file: ServiceFile = if content.trim().is_empty() {
            ServiceFile { services: vec![] }
        } else {
            serde_yaml::from_str(&content).map_err(|source| DirectoryError::Parse {
                path: self.path.clone(),
                source,
            })?
        };

        let now = Utc::now();
        let records: Vec<ServiceRecord> = file
            .services
            .into_iter()
            .filter(|s| s.topic == topic && !s.disabled)
            .map(|s| ServiceRecord {
                host: s.host,
                availability_zone: s.availability_zone,
                last_heartbeat: s.last_heartbeat.unwrap_or(now),
            })
            .collect();

        debug!(path = %self.path.display(), topic, services = records.len(), "service directory read");
        Ok(records)
    }
}

// ── StaticServiceDirectory ────────────────────────────────────────────────────

/// In-memory directory.  Every record is treated as enabled.
#[derive(Debug, Default)]
pub struct StaticServiceDirectory {
    records: RwLock<Vec<ServiceRecord>>,
}

impl StaticServiceDirectory {
    pub fn new(records: Vec<ServiceRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    pub fn set_records(&self, records: Vec<ServiceRecord>) {
        *self.records.write().unwrap_or_else(|e| e.into_inner()) = records;
    }

    /// Insert `record` or replace the one for the same host.
    pub fn upsert(&self, record: ServiceRecord) {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        match records.iter_mut().find(|r| r.host == record.host) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }

    pub fn remove(&self, host: &str) {
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|r| r.host != host);
    }

    /// Refresh `host`'s heartbeat.  Returns `false` for an unknown host.
    pub fn heartbeat(&self, host: &str, at: DateTime<Utc>) -> bool {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        match records.iter_mut().find(|r| r.host == host) {
            Some(r) => {
                r.last_heartbeat = at;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl ServiceDirectory for StaticServiceDirectory {
    async fn list_enabled_hosts(&self, _topic: &str) -> Result<Vec<ServiceRecord>, DirectoryError> {
        Ok(self.records.read().unwrap_or_else(|e| e.into_inner()).clone())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
