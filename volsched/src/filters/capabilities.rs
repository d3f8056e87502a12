/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Capabilities filter: extra specs and hints matched against what a backend
//! reports.
//!
//! Requirement keys are scoped by an optional `scope:` prefix:
//!
//! | Key | Source | Host lacks the capability |
//! |---|---|---|
//! | `capabilities:<k>` | extra specs, scheduler hints | host rejected |
//! | `<k>` (unscoped) | extra specs | requirement ignored |
//! | `<other>:<k>` | anywhere | requirement ignored (not for this filter) |
//!
//! Ignoring unscoped keys a backend does not report keeps new extra specs
//! from breaking placement on older backends.

use tracing::debug;

use crate::host_state::HostState;
use crate::request::{FilterProperties, RequestSpec};

use super::extra_specs_ops::Requirement;
use super::HostFilter;

const CAPABILITY_SCOPE: &str = "capabilities";

/// How strictly a requirement binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    /// Host must report the key and satisfy the requirement.
    Required,
    /// Checked only when the host reports the key.
    IfReported,
}

/// Split `key` into `(binding, capability name)`; `None` for foreign scopes.
fn classify(key: &str) -> Option<(Binding, &str)> {
    match key.split_once(':') {
        None => Some((Binding::IfReported, key)),
        Some((CAPABILITY_SCOPE, name)) if !name.is_empty() => Some((Binding::Required, name)),
        Some(_) => None,
    }
}

/// Every host must satisfy all capability requirements of the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapabilitiesFilter;

impl CapabilitiesFilter {
    /// Requirements from the volume type's extra specs and from
    /// `capabilities:`-scoped scheduler hints.
    fn requirements<'a>(
        spec: &'a RequestSpec,
        props: &'a FilterProperties,
    ) -> Vec<(Binding, &'a str, Requirement)> {
        let from_specs = spec.extra_specs().filter_map(|(key, value)| {
            classify(key).map(|(binding, name)| (binding, name, Requirement::parse(value)))
        });

        let from_hints = props.scheduler_hints.iter().filter_map(|(key, value)| {
            match classify(key) {
                Some((Binding::Required, name)) => {
                    Some((Binding::Required, name, value.to_requirement()))
                }
                _ => None,
            }
        });

        from_specs.chain(from_hints).collect()
    }
}

impl HostFilter for CapabilitiesFilter {
    fn name(&self) -> &'static str {
        "CapabilitiesFilter"
    }

    fn host_passes(&self, host: &HostState, spec: &RequestSpec, props: &FilterProperties) -> bool {
        for (binding, name, requirement) in Self::requirements(spec, props) {
            let satisfied = match host.capability(name) {
                Some(value) => requirement.matches(&value.to_string()),
                None => binding == Binding::IfReported,
            };
            if !satisfied {
                debug!(
                    host        = %host.host,
                    capability  = name,
                    requirement = %requirement,
                    reported    = ?host.capability(name),
                    "capability requirement not met"
                );
                return false;
            }
        }
        true
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host_manager::fixtures;
    use crate::request::{HintValue, VolumeType};

    fn spec_with(extra_specs: &[(&str, &str)]) -> RequestSpec {
        let vt = VolumeType {
            name: "t".into(),
            extra_specs: extra_specs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        RequestSpec::new("v", 1).with_volume_type(vt)
    }

    fn passing(spec: &RequestSpec, props: &FilterProperties) -> Vec<String> {
        fixtures::fleet_states()
            .into_iter()
            .filter(|h| CapabilitiesFilter.host_passes(h, spec, props))
            .map(|h| h.host.clone())
            .collect()
    }

    #[test]
    fn no_requirements_admits_everyone() {
        assert_eq!(passing(&RequestSpec::new("v", 1), &FilterProperties::default()).len(), 4);
    }

    #[test]
    fn plain_value_is_equality() {
        let spec = spec_with(&[("tier", "gold")]);
        assert_eq!(passing(&spec, &FilterProperties::default()), vec!["host1", "host4"]);
    }

    #[test]
    fn comparison_operators() {
        let spec = spec_with(&[("capabilities:max_iops", ">= 800")]);
        assert_eq!(passing(&spec, &FilterProperties::default()), vec!["host1", "host4"]);

        let spec = spec_with(&[("capabilities:max_iops", "< 500")]);
        assert_eq!(passing(&spec, &FilterProperties::default()), vec!["host3"]);
    }

    #[test]
    fn set_membership() {
        let spec = spec_with(&[("tier", "<or> silver <or> bronze")]);
        assert_eq!(passing(&spec, &FilterProperties::default()), vec!["host2", "host3"]);
    }

    #[test]
    fn backend_name_matches_synthetic_capability() {
        let spec = spec_with(&[("volume_backend_name", "ceph-1")]);
        assert_eq!(passing(&spec, &FilterProperties::default()), vec!["host3"]);
    }

    #[test]
    fn scoped_key_missing_on_host_rejects() {
        // only host1 reports thin_provisioning
        let spec = spec_with(&[("capabilities:thin_provisioning", "<is> True")]);
        assert_eq!(passing(&spec, &FilterProperties::default()), vec!["host1"]);
    }

    #[test]
    fn unscoped_key_missing_on_host_is_ignored() {
        let spec = spec_with(&[("replication_v9", "<is> True")]);
        assert_eq!(passing(&spec, &FilterProperties::default()).len(), 4);
    }

    #[test]
    fn foreign_scopes_are_ignored() {
        let spec = spec_with(&[("qos:max_iops", "1"), ("hint:whatever", "x")]);
        assert_eq!(passing(&spec, &FilterProperties::default()).len(), 4);
    }

    #[test]
    fn capability_hints_are_requirements() {
        let mut props = FilterProperties::default();
        props
            .scheduler_hints
            .insert("capabilities:max_iops".into(), HintValue::from("> 500"));
        // unscoped hints are not capability requirements
        props.scheduler_hints.insert("tier".into(), HintValue::from("bronze"));

        assert_eq!(passing(&RequestSpec::new("v", 1), &props), vec!["host1", "host4"]);
    }

    #[test]
    fn numeric_hint_is_numeric_equality() {
        let mut props = FilterProperties::default();
        props
            .scheduler_hints
            .insert("capabilities:max_iops".into(), HintValue::Number(500.0));
        assert_eq!(passing(&RequestSpec::new("v", 1), &props), vec!["host2"]);
    }

    #[test]
    fn classify_scopes() {
        assert_eq!(classify("tier"), Some((Binding::IfReported, "tier")));
        assert_eq!(classify("capabilities:tier"), Some((Binding::Required, "tier")));
        assert_eq!(classify("capabilities:"), None);
        assert_eq!(classify("qos:iops"), None);
    }
}
