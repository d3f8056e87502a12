/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Capacity filter: the host must have room for the requested size.

use tracing::{debug, warn};

use crate::host_state::{HostState, ReservedBasis};
use crate::request::{FilterProperties, RequestSpec};

use super::HostFilter;

/// Rejects hosts whose usable free capacity (free minus the reserved share)
/// is below the requested size.
///
/// * Unknown free capacity → rejected rather than optimistically admitted.
/// * Infinite free capacity → admitted.
/// * The host named in `vol_exists_on` is admitted unconditionally: the data
///   is already there.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapacityFilter {
    basis: ReservedBasis,
}

impl CapacityFilter {
    pub fn new(basis: ReservedBasis) -> Self {
        Self { basis }
    }
}

impl HostFilter for CapacityFilter {
    fn name(&self) -> &'static str {
        "CapacityFilter"
    }

    fn host_passes(&self, host: &HostState, spec: &RequestSpec, props: &FilterProperties) -> bool {
        if props.vol_exists_on.as_deref() == Some(host.host.as_str()) {
            return true;
        }

        let requested = spec.size_gb as f64;
        let Some(usable) = host.usable_free_capacity_gb(self.basis) else {
            warn!(
                host = %host.host,
                "free capacity unknown, excluding host from placement"
            );
            return false;
        };

        if usable < requested {
            debug!(
                host         = %host.host,
                requested_gb = requested,
                usable_gb    = usable,
                reserved_pct = host.reserved_percentage,
                "insufficient free space"
            );
            return false;
        }
        true
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
