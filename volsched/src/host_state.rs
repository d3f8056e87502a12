/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Per-backend state as seen by the scheduler.
//!
//! Two types model the two sides of capability reporting:
//!
//! ```text
//! backend  ──(fanout)──►  CapabilityReport  ──(registry)──►  HostState
//!                          ↑ wire message                     ↑ owned by HostStateRegistry
//!                          timestamped by the backend         replaced wholesale per report
//! ```
//!
//! All capacities are expressed in GB as `f64`, the unit backends report in.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Availability zone assigned to a host until the service directory says
/// otherwise.
pub const DEFAULT_AVAILABILITY_ZONE: &str = "nova";

/// Capability key that always resolves to the host's backend name.
pub const BACKEND_NAME_KEY: &str = "volume_backend_name";

// ── Capacity ──────────────────────────────────────────────────────────────────

/// A capacity figure as reported by a backend.
///
/// Backends that cannot (or will not) compute a figure report the strings
/// `"infinite"` or `"unknown"` instead of a number.  Carrying these as enum
/// variants instead of sentinel floats keeps the capacity filter honest: an
/// `Unknown` host is excluded, an `Infinite` one is admitted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCapacity", into = "RawCapacity")]
pub enum Capacity {
    /// A concrete figure in GB.
    Known(f64),
    /// Thin/elastic backend with no practical limit.
    Infinite,
    /// The backend could not determine the figure.
    Unknown,
}

impl Capacity {
    /// Returns the GB value for `Known`, `None` otherwise.
    pub fn known(self) -> Option<f64> {
        match self {
            Capacity::Known(gb) => Some(gb),
            Capacity::Infinite | Capacity::Unknown => None,
        }
    }
}

impl Default for Capacity {
    fn default() -> Self {
        Capacity::Unknown
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capacity::Known(gb) => write!(f, "{gb}GB"),
            Capacity::Infinite => f.write_str("infinite"),
            Capacity::Unknown => f.write_str("unknown"),
        }
    }
}

/// Wire form of [`Capacity`]: a bare number or one of two keywords.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawCapacity {
    Number(f64),
    Word(String),
}

impl TryFrom<RawCapacity> for Capacity {
    type Error = String;

    fn try_from(raw: RawCapacity) -> Result<Self, Self::Error> {
        match raw {
            RawCapacity::Number(gb) if gb.is_finite() && gb >= 0.0 => Ok(Capacity::Known(gb)),
            RawCapacity::Number(gb) => Err(format!("invalid capacity {gb}")),
            RawCapacity::Word(w) => match w.to_ascii_lowercase().as_str() {
                "infinite" => Ok(Capacity::Infinite),
                "unknown" => Ok(Capacity::Unknown),
                _ => Err(format!("invalid capacity '{w}'")),
            },
        }
    }
}

impl From<Capacity> for RawCapacity {
    fn from(c: Capacity) -> Self {
        match c {
            Capacity::Known(gb) => RawCapacity::Number(gb),
            Capacity::Infinite => RawCapacity::Word("infinite".into()),
            Capacity::Unknown => RawCapacity::Word("unknown".into()),
        }
    }
}

// ── Reserved-percentage semantics ─────────────────────────────────────────────

/// What the reserved percentage is a percentage *of*.
///
/// `Total` withholds `total × reserved%` from the free figure.  `Free`
/// withholds `free × reserved%`.  Operators choose with the
/// `reserved_basis` configuration key; `Total` is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservedBasis {
    #[default]
    Total,
    Free,
}

// ── Capability values ─────────────────────────────────────────────────────────

/// One value in a backend's capability map.
///
/// Backends report arbitrary JSON scalars; the scheduler only needs to compare
/// them against extra-spec requirements, which are always strings, so every
/// variant renders to a string via [`Display`](fmt::Display).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CapabilityValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl fmt::Display for CapabilityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityValue::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            CapabilityValue::Number(n) => write!(f, "{n}"),
            CapabilityValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for CapabilityValue {
    fn from(s: &str) -> Self {
        CapabilityValue::Text(s.to_string())
    }
}

impl From<f64> for CapabilityValue {
    fn from(n: f64) -> Self {
        CapabilityValue::Number(n)
    }
}

impl From<bool> for CapabilityValue {
    fn from(b: bool) -> Self {
        CapabilityValue::Bool(b)
    }
}

/// Backend-specific capability map, sorted for deterministic logging.
pub type Capabilities = BTreeMap<String, CapabilityValue>;

// ── CapabilityReport (wire) ───────────────────────────────────────────────────

/// Periodic self-description pushed by a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityReport {
    pub host: String,

    #[serde(default)]
    pub backend_name: String,

    pub total_capacity_gb: Capacity,

    pub free_capacity_gb: Capacity,

    #[serde(default)]
    pub allocated_capacity_gb: f64,

    /// Share of capacity withheld from allocation, 0–100.  Values above 100
    /// are clamped on ingest.
    #[serde(default)]
    pub reserved_percentage: u32,

    #[serde(default)]
    pub capabilities: Capabilities,

    /// Time the backend produced the report.  Used to drop reordered
    /// deliveries.
    pub timestamp: DateTime<Utc>,
}

// ── HostState ─────────────────────────────────────────────────────────────────

/// In-memory snapshot of one backend's capacity and configuration.
///
/// Only [`HostStateRegistry`](crate::host_manager::HostStateRegistry) creates
/// or mutates these; everybody else sees immutable `Arc<HostState>`
/// snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct HostState {
    pub host: String,
    pub backend_name: String,
    /// Owned by the service directory, not by capability reports.
    pub availability_zone: String,
    pub total_capacity_gb: Capacity,
    pub free_capacity_gb: Capacity,
    pub allocated_capacity_gb: f64,
    pub reserved_percentage: u32,
    pub capabilities: Capabilities,
    /// Timestamp of the report currently held.
    pub updated_at: DateTime<Utc>,
}

impl HostState {
    /// Build the entry for a host reporting for the first time.
    pub fn from_report(report: &CapabilityReport) -> Self {
        let mut state = HostState {
            host: report.host.clone(),
            backend_name: String::new(),
            availability_zone: DEFAULT_AVAILABILITY_ZONE.to_string(),
            total_capacity_gb: Capacity::Unknown,
            free_capacity_gb: Capacity::Unknown,
            allocated_capacity_gb: 0.0,
            reserved_percentage: 0,
            capabilities: Capabilities::new(),
            updated_at: report.timestamp,
        };
        state.replace_capabilities(report);
        state
    }

    /// Replace every report-owned field with the contents of `report`.
    ///
    /// This is a full replace: capability keys absent from `report` disappear.
    /// The availability zone is left untouched.
    pub fn replace_capabilities(&mut self, report: &CapabilityReport) {
        self.backend_name = report.backend_name.clone();
        self.total_capacity_gb = report.total_capacity_gb;
        self.free_capacity_gb = report.free_capacity_gb;
        self.allocated_capacity_gb = report.allocated_capacity_gb;
        self.reserved_percentage = report.reserved_percentage.min(100);
        self.capabilities = report.capabilities.clone();
        self.updated_at = report.timestamp;
    }

    /// Free capacity left after the reserved share is withheld.
    ///
    /// * `None` when the backend reports unknown free capacity.
    /// * `f64::INFINITY` for infinite free capacity.
    /// * Under [`ReservedBasis::Total`] a host whose total is not a concrete
    ///   figure withholds nothing.
    ///
    /// The result may be negative when the reservation exceeds what is free.
    pub fn usable_free_capacity_gb(&self, basis: ReservedBasis) -> Option<f64> {
        let free = match self.free_capacity_gb {
            Capacity::Unknown => return None,
            Capacity::Infinite => return Some(f64::INFINITY),
            Capacity::Known(gb) => gb,
        };
        let ratio = f64::from(self.reserved_percentage) / 100.0;
        let reserved = match basis {
            ReservedBasis::Total => self.total_capacity_gb.known().unwrap_or(0.0) * ratio,
            ReservedBasis::Free => free * ratio,
        };
        Some(free - reserved)
    }

    /// Look up a capability, resolving [`BACKEND_NAME_KEY`] to the backend
    /// name when the backend did not report it explicitly.
    pub fn capability(&self, key: &str) -> Option<CapabilityValue> {
        match self.capabilities.get(key) {
            Some(v) => Some(v.clone()),
            None if key == BACKEND_NAME_KEY && !self.backend_name.is_empty() => {
                Some(CapabilityValue::Text(self.backend_name.clone()))
            }
            None => None,
        }
    }

    /// Account for a volume placed here before the next report arrives.
    ///
    /// `updated_at` is deliberately left alone so the next genuine report
    /// replaces these local figures.
    pub fn consume_from_volume(&mut self, size_gb: f64) {
        if let Capacity::Known(free) = self.free_capacity_gb {
            self.free_capacity_gb = Capacity::Known(free - size_gb);
        }
        self.allocated_capacity_gb += size_gb;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn report(free: Capacity, total: Capacity, reserved: u32) -> CapabilityReport {
        CapabilityReport {
            host: "host1".into(),
            backend_name: "lvm".into(),
            total_capacity_gb: total,
            free_capacity_gb: free,
            allocated_capacity_gb: 0.0,
            reserved_percentage: reserved,
            capabilities: Capabilities::new(),
            timestamp: Utc.timestamp_opt(1_000, 0).unwrap(),
        }
    }

    // ── Capacity ──────────────────────────────────────────────────────────────

    #[test]
    fn capacity_parses_numbers_and_keywords() {
        let c: Capacity = serde_json::from_str("512.5").unwrap();
        assert_eq!(c, Capacity::Known(512.5));
        let c: Capacity = serde_json::from_str("\"infinite\"").unwrap();
        assert_eq!(c, Capacity::Infinite);
        let c: Capacity = serde_json::from_str("\"Unknown\"").unwrap();
        assert_eq!(c, Capacity::Unknown);
    }

    #[test]
    fn capacity_rejects_garbage() {
        assert!(serde_json::from_str::<Capacity>("\"plenty\"").is_err());
        assert!(serde_json::from_str::<Capacity>("-1").is_err());
    }

    #[test]
    fn capacity_serialises_keywords_back_to_strings() {
        assert_eq!(serde_json::to_string(&Capacity::Infinite).unwrap(), "\"infinite\"");
        assert_eq!(serde_json::to_string(&Capacity::Known(10.0)).unwrap(), "10.0");
    }

    // ── usable_free_capacity_gb ───────────────────────────────────────────────

    #[test]
    fn usable_free_withholds_share_of_total_by_default() {
        let hs = HostState::from_report(&report(
            Capacity::Known(300.0),
            Capacity::Known(2048.0),
            10,
        ));
        let usable = hs.usable_free_capacity_gb(ReservedBasis::Total).unwrap();
        assert!((usable - 95.2).abs() < 1e-9, "got {usable}");
    }

    #[test]
    fn usable_free_withholds_share_of_free_under_free_basis() {
        let hs = HostState::from_report(&report(
            Capacity::Known(300.0),
            Capacity::Known(2048.0),
            10,
        ));
        let usable = hs.usable_free_capacity_gb(ReservedBasis::Free).unwrap();
        assert!((usable - 270.0).abs() < 1e-9, "got {usable}");
    }

    #[test]
    fn usable_free_unknown_is_none_and_infinite_is_infinite() {
        let unknown = HostState::from_report(&report(Capacity::Unknown, Capacity::Unknown, 0));
        assert_eq!(unknown.usable_free_capacity_gb(ReservedBasis::Total), None);

        let inf = HostState::from_report(&report(Capacity::Infinite, Capacity::Infinite, 50));
        assert_eq!(
            inf.usable_free_capacity_gb(ReservedBasis::Total),
            Some(f64::INFINITY)
        );
    }

    #[test]
    fn reserved_percentage_is_clamped() {
        let hs = HostState::from_report(&report(
            Capacity::Known(100.0),
            Capacity::Known(100.0),
            250,
        ));
        assert_eq!(hs.reserved_percentage, 100);
        assert_eq!(hs.usable_free_capacity_gb(ReservedBasis::Total), Some(0.0));
    }

    // ── replace / consume ─────────────────────────────────────────────────────

    #[test]
    fn replace_drops_keys_missing_from_new_report_but_keeps_zone() {
        let mut first = report(Capacity::Known(10.0), Capacity::Known(10.0), 0);
        first.capabilities.insert("thin".into(), true.into());
        let mut hs = HostState::from_report(&first);
        hs.availability_zone = "zone-a".into();

        let second = report(Capacity::Known(5.0), Capacity::Known(10.0), 0);
        hs.replace_capabilities(&second);

        assert!(hs.capabilities.is_empty());
        assert_eq!(hs.free_capacity_gb, Capacity::Known(5.0));
        assert_eq!(hs.availability_zone, "zone-a");
    }

    #[test]
    fn consume_moves_free_to_allocated_without_touching_timestamp() {
        let r = report(Capacity::Known(100.0), Capacity::Known(100.0), 0);
        let mut hs = HostState::from_report(&r);
        hs.consume_from_volume(30.0);
        assert_eq!(hs.free_capacity_gb, Capacity::Known(70.0));
        assert_eq!(hs.allocated_capacity_gb, 30.0);
        assert_eq!(hs.updated_at, r.timestamp);
    }

    #[test]
    fn backend_name_is_exposed_as_capability() {
        let hs = HostState::from_report(&report(Capacity::Unknown, Capacity::Unknown, 0));
        assert_eq!(
            hs.capability(BACKEND_NAME_KEY),
            Some(CapabilityValue::Text("lvm".into()))
        );
        assert_eq!(hs.capability("missing"), None);
    }

    #[test]
    fn capability_values_render_as_strings() {
        assert_eq!(CapabilityValue::Number(100.0).to_string(), "100");
        assert_eq!(CapabilityValue::Number(1.5).to_string(), "1.5");
        assert_eq!(CapabilityValue::Bool(true).to_string(), "True");
        assert_eq!(CapabilityValue::from("gold").to_string(), "gold");
    }
}
