/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Capacity-based weighers.

use crate::host_state::{Capacity, HostState, ReservedBasis};
use crate::request::FilterProperties;

use super::HostWeigher;

/// Ranks hosts by usable free capacity.
///
/// With a positive multiplier the emptiest backend wins (spreading); with a
/// negative one the fullest wins (stacking).  Hosts with infinite or unknown
/// capacity always sort last: they get the lowest raw score under a positive
/// multiplier and an infinite one under a negative multiplier.
#[derive(Debug, Clone)]
pub struct CapacityWeigher {
    multiplier: f64,
    use_ratio: bool,
    basis: ReservedBasis,
}

impl CapacityWeigher {
    pub fn new(multiplier: f64, use_ratio: bool, basis: ReservedBasis) -> Self {
        Self {
            multiplier,
            use_ratio,
            basis,
        }
    }

    fn unranked(&self) -> f64 {
        if self.multiplier >= 0.0 {
            -1.0
        } else {
            f64::INFINITY
        }
    }
}

impl HostWeigher for CapacityWeigher {
    fn name(&self) -> &'static str {
        "CapacityWeigher"
    }

    fn multiplier(&self) -> f64 {
        self.multiplier
    }

    fn weigh_object(&self, host: &HostState, _props: &FilterProperties) -> f64 {
        let usable = match host.usable_free_capacity_gb(self.basis) {
            Some(gb) if gb.is_finite() => gb,
            _ => return self.unranked(),
        };
        if !self.use_ratio {
            return usable;
        }
        match host.total_capacity_gb {
            Capacity::Known(total) if total > 0.0 => usable / total,
            _ => self.unranked(),
        }
    }
}

/// Ranks hosts by capacity already allocated by the scheduler.
///
/// The default multiplier is negative, so the least-allocated backend wins.
#[derive(Debug, Clone)]
pub struct AllocatedCapacityWeigher {
    multiplier: f64,
}

impl AllocatedCapacityWeigher {
    pub fn new(multiplier: f64) -> Self {
        Self { multiplier }
    }
}

impl HostWeigher for AllocatedCapacityWeigher {
    fn name(&self) -> &'static str {
        "AllocatedCapacityWeigher"
    }

    fn multiplier(&self) -> f64 {
        self.multiplier
    }

    fn weigh_object(&self, host: &HostState, _props: &FilterProperties) -> f64 {
        host.allocated_capacity_gb
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
