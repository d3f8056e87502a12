/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Host filters: hard constraints that remove ineligible hosts.
//!
//! Each filter is a stateless predicate over one host, so the chain is safe to
//! share across concurrent scheduling calls and the set of survivors does not
//! depend on filter order.  Order only affects the elimination counts reported
//! in diagnostics.
//!
//! Filters are looked up by name from a fixed registry ([`FILTER_NAMES`]) once
//! at startup:
//!
//! | Name | Removes a host when |
//! |---|---|
//! | `AvailabilityZoneFilter` | the request names a zone and the host is elsewhere |
//! | `CapacityFilter` | usable free capacity is below the requested size, or unknown |
//! | `CapabilitiesFilter` | an extra-spec / hint requirement is not met |
//! | `RetryFilter` | the host already failed this request |

pub mod availability_zone;
pub mod capabilities;
pub mod capacity;
pub mod extra_specs_ops;
pub mod retry;

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::SchedulerSection;
use crate::host_state::HostState;
use crate::request::{FilterProperties, RequestSpec};
use crate::scheduler::error::{FilterElimination, SchedulerError};

pub use availability_zone::AvailabilityZoneFilter;
pub use capabilities::CapabilitiesFilter;
pub use capacity::CapacityFilter;
pub use retry::RetryFilter;

/// Names accepted in `scheduler.default_filters`.
pub const FILTER_NAMES: &[&str] = &[
    "AvailabilityZoneFilter",
    "CapacityFilter",
    "CapabilitiesFilter",
    "RetryFilter",
];

/// A pure predicate deciding whether one host may take the request.
pub trait HostFilter: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn host_passes(&self, host: &HostState, spec: &RequestSpec, props: &FilterProperties) -> bool;
}

/// Registry lookup: filter name → constructed filter.
fn build_filter(name: &str, section: &SchedulerSection) -> Option<Box<dyn HostFilter>> {
    let filter: Box<dyn HostFilter> = match name {
        "AvailabilityZoneFilter" => Box::new(AvailabilityZoneFilter),
        "CapacityFilter" => Box::new(CapacityFilter::new(section.reserved_basis)),
        "CapabilitiesFilter" => Box::new(CapabilitiesFilter),
        "RetryFilter" => Box::new(RetryFilter),
        _ => return None,
    };
    Some(filter)
}

// ── FilterChain ───────────────────────────────────────────────────────────────

/// Survivors of one filter pass plus per-filter elimination counts.
#[derive(Debug)]
pub struct FilterOutcome {
    pub passed: Vec<Arc<HostState>>,
    pub eliminations: Vec<FilterElimination>,
}

/// Ordered, immutable list of filters.
#[derive(Debug)]
pub struct FilterChain {
    filters: Vec<Box<dyn HostFilter>>,
}

impl FilterChain {
    /// Resolve `names` through the registry, preserving order.
    ///
    /// # Errors
    /// [`SchedulerError::UnknownFilter`] for the first unknown name.
    pub fn from_names<S: AsRef<str>>(
        names: &[S],
        section: &SchedulerSection,
    ) -> Result<Self, SchedulerError> {
        let filters = names
            .iter()
            .map(|n| {
                build_filter(n.as_ref(), section)
                    .ok_or_else(|| SchedulerError::UnknownFilter(n.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { filters })
    }

    /// Build a chain from already-constructed filters.
    pub fn new(filters: Vec<Box<dyn HostFilter>>) -> Self {
        Self { filters }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Run every filter in registration order over `hosts`.
    ///
    /// Stops early once no host is left; filters that did not run do not
    /// appear in `eliminations`.
    pub fn filter(
        &self,
        mut hosts: Vec<Arc<HostState>>,
        spec: &RequestSpec,
        props: &FilterProperties,
    ) -> FilterOutcome {
        let mut eliminations = Vec::with_capacity(self.filters.len());

        for filter in &self.filters {
            if hosts.is_empty() {
                break;
            }
            let before = hosts.len();
            hosts.retain(|h| filter.host_passes(h, spec, props));

            debug!(
                filter    = filter.name(),
                volume_id = %spec.volume_id,
                eliminated = before - hosts.len(),
                remaining  = hosts.len(),
                "filter applied"
            );
            eliminations.push(FilterElimination {
                filter: filter.name().to_string(),
                eliminated: before - hosts.len(),
                remaining: hosts.len(),
            });
        }

        FilterOutcome {
            passed: hosts,
            eliminations,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
