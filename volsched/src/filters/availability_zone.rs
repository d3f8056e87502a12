/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use crate::host_state::HostState;
use crate::request::{FilterProperties, RequestSpec};

use super::HostFilter;

/// When the request names an availability zone, the host must be in exactly
/// that zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct AvailabilityZoneFilter;

impl HostFilter for AvailabilityZoneFilter {
    fn name(&self) -> &'static str {
        "AvailabilityZoneFilter"
    }

    fn host_passes(&self, host: &HostState, spec: &RequestSpec, _props: &FilterProperties) -> bool {
        match spec.availability_zone.as_deref() {
            Some(zone) => host.availability_zone == zone,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host_manager::fixtures;

    #[test]
    fn no_zone_requested_admits_everyone() {
        let spec = RequestSpec::new("v", 1);
        for h in fixtures::fleet_states() {
            assert!(AvailabilityZoneFilter.host_passes(&h, &spec, &FilterProperties::default()));
        }
    }

    #[test]
    fn zone_must_match_exactly() {
        let spec = RequestSpec::new("v", 1).with_availability_zone("zone1");
        let props = FilterProperties::default();
        assert!(AvailabilityZoneFilter.host_passes(&fixtures::fleet_state("host1"), &spec, &props));
        assert!(!AvailabilityZoneFilter.host_passes(&fixtures::fleet_state("host3"), &spec, &props));

        let prefix = RequestSpec::new("v", 1).with_availability_zone("zone");
        assert!(!AvailabilityZoneFilter.host_passes(&fixtures::fleet_state("host1"), &prefix, &props));
    }
}
