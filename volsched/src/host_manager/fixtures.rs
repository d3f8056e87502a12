/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Four-backend test fleet shared by the filter, weigher and scheduler tests.
//!
//! | Host | Zone | Backend | Free | Total | Reserved | Usable (total basis) |
//! |---|---|---|---|---|---|---|
//! | host1 | zone1 | lvm-1  | 1024 | 1024 | 10 % | 921.6 |
//! | host2 | zone1 | lvm-2  |  300 | 2048 | 10 % |  95.2 |
//! | host3 | zone2 | ceph-1 |  256 |  512 |  0 % | 256.0 |
//! | host4 | zone2 | nfs-1  |  200 | 2048 |  5 % |  97.6 |

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use super::directory::{ServiceRecord, StaticServiceDirectory};
use super::HostStateRegistry;
use crate::config::SchedulerSection;
use crate::host_state::{Capabilities, CapabilityReport, CapabilityValue, Capacity, HostState};

pub(crate) const FLEET: &[&str] = &["host1", "host2", "host3", "host4"];

/// Report timestamp used by [`fleet_reports`] callers that don't care.
pub(crate) fn epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

fn zone_of(host: &str) -> &'static str {
    match host {
        "host1" | "host2" => "zone1",
        _ => "zone2",
    }
}

fn caps(entries: &[(&str, CapabilityValue)]) -> Capabilities {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

pub(crate) fn fleet_reports(ts: DateTime<Utc>) -> Vec<CapabilityReport> {
    let report = |host: &str, backend: &str, free: f64, total: f64, allocated: f64, reserved: u32, capabilities| {
        CapabilityReport {
            host: host.to_string(),
            backend_name: backend.to_string(),
            total_capacity_gb: Capacity::Known(total),
            free_capacity_gb: Capacity::Known(free),
            allocated_capacity_gb: allocated,
            reserved_percentage: reserved,
            capabilities,
            timestamp: ts,
        }
    };
    vec![
        report(
            "host1",
            "lvm-1",
            1024.0,
            1024.0,
            0.0,
            10,
            caps(&[
                ("tier", "gold".into()),
                ("max_iops", 1000.0_f64.into()),
                ("thin_provisioning", true.into()),
            ]),
        ),
        report(
            "host2",
            "lvm-2",
            300.0,
            2048.0,
            1748.0,
            10,
            caps(&[("tier", "silver".into()), ("max_iops", 500.0_f64.into())]),
        ),
        report(
            "host3",
            "ceph-1",
            256.0,
            512.0,
            256.0,
            0,
            caps(&[
                ("tier", "bronze".into()),
                ("max_iops", 200.0_f64.into()),
                ("thin", false.into()),
            ]),
        ),
        report(
            "host4",
            "nfs-1",
            200.0,
            2048.0,
            1848.0,
            5,
            caps(&[("tier", "gold".into()), ("max_iops", 800.0_f64.into())]),
        ),
    ]
}

/// One fleet host with its zone applied.
pub(crate) fn fleet_state(name: &str) -> HostState {
    let report = fleet_reports(epoch())
        .into_iter()
        .find(|r| r.host == name)
        .unwrap_or_else(|| panic!("no fixture host {name}"));
    let mut state = HostState::from_report(&report);
    state.availability_zone = zone_of(name).to_string();
    state
}

/// The whole fleet, sorted by host name.
pub(crate) fn fleet_states() -> Vec<Arc<HostState>> {
    FLEET.iter().map(|h| Arc::new(fleet_state(h))).collect()
}

/// Directory listing every fleet host as alive now.
pub(crate) fn fleet_directory() -> Arc<StaticServiceDirectory> {
    let now = Utc::now();
    Arc::new(StaticServiceDirectory::new(
        FLEET
            .iter()
            .map(|h| ServiceRecord::new(*h, zone_of(h), now))
            .collect(),
    ))
}

/// Registry over [`fleet_directory`] with every fleet report ingested.
pub(crate) fn fleet_registry(
    section: &SchedulerSection,
) -> (Arc<HostStateRegistry>, Arc<StaticServiceDirectory>) {
    let directory = fleet_directory();
    let registry = Arc::new(HostStateRegistry::new(section, directory.clone()));
    for report in fleet_reports(epoch()) {
        registry.update_capabilities(&section.topic, &report.host, &report);
    }
    (registry, directory)
}
