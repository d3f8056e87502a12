/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use tracing::debug;

use crate::host_state::HostState;
use crate::request::{FilterProperties, RequestSpec};

use super::HostFilter;

/// Excludes hosts that already failed to provision this request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryFilter;

impl HostFilter for RetryFilter {
    fn name(&self) -> &'static str {
        "RetryFilter"
    }

    fn host_passes(&self, host: &HostState, spec: &RequestSpec, props: &FilterProperties) -> bool {
        let attempted = props.was_attempted(&host.host);
        if attempted {
            debug!(
                host      = %host.host,
                volume_id = %spec.volume_id,
                "host already attempted for this request"
            );
        }
        !attempted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host_manager::fixtures;

    #[test]
    fn attempted_hosts_are_excluded() {
        let mut props = FilterProperties::default();
        props.record_failure("host1", "out of extents");
        let spec = RequestSpec::new("v", 1);

        assert!(!RetryFilter.host_passes(&fixtures::fleet_state("host1"), &spec, &props));
        assert!(RetryFilter.host_passes(&fixtures::fleet_state("host2"), &spec, &props));
    }

    #[test]
    fn no_history_admits_everyone() {
        let spec = RequestSpec::new("v", 1);
        for h in fixtures::fleet_states() {
            assert!(RetryFilter.host_passes(&h, &spec, &FilterProperties::default()));
        }
    }
}
