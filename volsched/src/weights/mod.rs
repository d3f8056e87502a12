/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Host weighers: soft preferences that rank the hosts surviving the filters.
//!
//! # Combination
//! Each weigher produces a raw score per host.  Raw scores are min-max
//! normalised per weigher into `[0.0, 1.0]`, so a weigher with large raw
//! values (GB) cannot drown one with small ones (ratios), then combined as
//!
//! ```text
//! weight(host) = Σ  multiplier_w × normalised_w(host)
//! ```
//!
//! A positive multiplier favours high raw values, a negative one low values.
//! Hosts are ranked by descending weight; equal weights fall back to
//! ascending host name so ranking is reproducible.

pub mod capacity;

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::SchedulerSection;
use crate::host_state::HostState;
use crate::request::FilterProperties;
use crate::scheduler::error::SchedulerError;

pub use capacity::{AllocatedCapacityWeigher, CapacityWeigher};

/// Names accepted in `scheduler.default_weighers`.
pub const WEIGHER_NAMES: &[&str] = &["CapacityWeigher", "AllocatedCapacityWeigher"];

/// A pure scoring function over one host.
pub trait HostWeigher: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Scale applied to the normalised score.
    fn multiplier(&self) -> f64;

    /// Raw, un-normalised score.  May be `f64::INFINITY` to mean "beyond
    /// every finite score".
    fn weigh_object(&self, host: &HostState, props: &FilterProperties) -> f64;
}

fn build_weigher(name: &str, section: &SchedulerSection) -> Option<Box<dyn HostWeigher>> {
    let weigher: Box<dyn HostWeigher> = match name {
        "CapacityWeigher" => Box::new(CapacityWeigher::new(
            section.capacity_weight_multiplier,
            section.capacity_weigher_use_ratio,
            section.reserved_basis,
        )),
        "AllocatedCapacityWeigher" => Box::new(AllocatedCapacityWeigher::new(
            section.allocated_capacity_weight_multiplier,
        )),
        _ => return None,
    };
    Some(weigher)
}

/// Min-max normalise `raw` into `[0.0, 1.0]`.
///
/// * Range is taken over finite values only.
/// * `+inf` maps to `1.0` and ranks above every finite value: when present,
///   the top of the range is stretched to `max + 1`.
/// * `-inf` and `NaN` map to `0.0`.
/// * When every finite value is equal and there is no `+inf` they all map
///   to `0.0`.
pub fn normalize(raw: &[f64]) -> Vec<f64> {
    let (min, mut max) = raw
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if raw.contains(&f64::INFINITY) {
        max += 1.0;
    }
    let range = max - min;

    raw.iter()
        .map(|&v| {
            if v == f64::INFINITY {
                1.0
            } else if !v.is_finite() {
                0.0
            } else if range > 0.0 {
                (v - min) / range
            } else {
                0.0
            }
        })
        .collect()
}

// ── WeighedHost ───────────────────────────────────────────────────────────────

/// A candidate host with its combined weight.
#[derive(Debug, Clone)]
pub struct WeighedHost {
    pub host: Arc<HostState>,
    pub weight: f64,
}

impl WeighedHost {
    pub fn name(&self) -> &str {
        &self.host.host
    }
}

// ── WeigherChain ──────────────────────────────────────────────────────────────

/// Ordered, immutable list of weighers.
#[derive(Debug)]
pub struct WeigherChain {
    weighers: Vec<Box<dyn HostWeigher>>,
}

impl WeigherChain {
    /// Resolve `names` through the registry, preserving order.
    ///
    /// # Errors
    /// [`SchedulerError::UnknownWeigher`] for the first unknown name.
    pub fn from_names<S: AsRef<str>>(
        names: &[S],
        section: &SchedulerSection,
    ) -> Result<Self, SchedulerError> {
        let weighers = names
            .iter()
            .map(|n| {
                build_weigher(n.as_ref(), section)
                    .ok_or_else(|| SchedulerError::UnknownWeigher(n.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { weighers })
    }

    pub fn new(weighers: Vec<Box<dyn HostWeigher>>) -> Self {
        Self { weighers }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.weighers.iter().map(|w| w.name()).collect()
    }

    /// Score and rank `hosts`, best first.
    pub fn weigh(&self, hosts: Vec<Arc<HostState>>, props: &FilterProperties) -> Vec<WeighedHost> {
        let mut totals = vec![0.0_f64; hosts.len()];

        for weigher in &self.weighers {
            let raw: Vec<f64> = hosts
                .iter()
                .map(|h| weigher.weigh_object(h, props))
                .collect();
            let multiplier = weigher.multiplier();
            for (total, norm) in totals.iter_mut().zip(normalize(&raw)) {
                *total += multiplier * norm;
            }
        }

        let mut ranked: Vec<WeighedHost> = hosts
            .into_iter()
            .zip(totals)
            .map(|(host, weight)| WeighedHost { host, weight })
            .collect();
        ranked.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.host.host.cmp(&b.host.host))
        });

        for w in &ranked {
            debug!(host = %w.host.host, weight = w.weight, "weighed host");
        }
        ranked
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host_manager::fixtures;

    /// Scores every host with a fixed raw value looked up by name.
    #[derive(Debug)]
    struct Fixed(Vec<(&'static str, f64)>, f64);

    impl HostWeigher for Fixed {
        fn name(&self) -> &'static str {
            "Fixed"
        }
        fn multiplier(&self) -> f64 {
            self.1
        }
        fn weigh_object(&self, host: &HostState, _props: &FilterProperties) -> f64 {
            self.0
                .iter()
                .find(|(n, _)| *n == host.host)
                .map(|(_, v)| *v)
                .unwrap_or(0.0)
        }
    }

    fn order(ranked: &[WeighedHost]) -> Vec<&str> {
        ranked.iter().map(|w| w.name()).collect()
    }

    // ── normalize ─────────────────────────────────────────────────────────────

    #[test]
    fn normalize_stays_in_unit_range() {
        let samples: Vec<Vec<f64>> = vec![
            vec![1.0, 2.0, 3.0],
            vec![-50.0, 0.0, 1e12],
            vec![7.0],
            vec![],
            vec![3.0, 3.0, 3.0],
            vec![-1.0, f64::INFINITY, 10.0],
            vec![f64::NAN, 4.0, f64::NEG_INFINITY],
        ];
        for raw in samples {
            for v in normalize(&raw) {
                assert!((0.0..=1.0).contains(&v), "{v} out of range for {raw:?}");
            }
        }
    }

    #[test]
    fn normalize_preserves_order() {
        let raw = [921.6, 95.2, 256.0, 97.6, 10.0];
        let norm = normalize(&raw);
        for i in 0..raw.len() {
            for j in 0..raw.len() {
                if raw[i] < raw[j] {
                    assert!(norm[i] < norm[j], "rank inversion between {i} and {j}");
                }
            }
        }
        assert_eq!(norm[4], 0.0);
        assert_eq!(norm[0], 1.0);
    }

    #[test]
    fn normalize_equal_values_are_zero() {
        assert_eq!(normalize(&[5.0, 5.0]), vec![0.0, 0.0]);
        assert_eq!(normalize(&[5.0, f64::INFINITY]), vec![0.0, 1.0]);
        assert_eq!(normalize(&[f64::INFINITY]), vec![1.0]);
    }

    #[test]
    fn infinity_outranks_the_finite_maximum() {
        let norm = normalize(&[0.0, 10.0, f64::INFINITY]);
        assert!(norm[1] < norm[2]);
        assert!((norm[1] - 10.0 / 11.0).abs() < 1e-12);
    }

    // ── WeigherChain ──────────────────────────────────────────────────────────

    #[test]
    fn unknown_name_is_rejected() {
        let err = WeigherChain::from_names(&["ChanceWeigher"], &SchedulerSection::default())
            .unwrap_err();
        assert!(matches!(err, SchedulerError::UnknownWeigher(_)));
    }

    #[test]
    fn ties_break_by_host_name() {
        let chain = WeigherChain::new(vec![Box::new(Fixed(vec![], 1.0))]);
        let mut hosts = fixtures::fleet_states();
        hosts.reverse();
        let ranked = chain.weigh(hosts, &FilterProperties::default());
        assert_eq!(order(&ranked), vec!["host1", "host2", "host3", "host4"]);
    }

    #[test]
    fn empty_chain_ranks_by_name() {
        let chain = WeigherChain::new(vec![]);
        let ranked = chain.weigh(fixtures::fleet_states(), &FilterProperties::default());
        assert!(ranked.iter().all(|w| w.weight == 0.0));
        assert_eq!(order(&ranked)[0], "host1");
    }

    #[test]
    fn negative_multiplier_prefers_low_raw_values() {
        let fixed = vec![("host1", 10.0), ("host2", 20.0), ("host3", 30.0), ("host4", 40.0)];
        let up = WeigherChain::new(vec![Box::new(Fixed(fixed.clone(), 1.0))]);
        let down = WeigherChain::new(vec![Box::new(Fixed(fixed, -1.0))]);

        let hosts = fixtures::fleet_states();
        assert_eq!(order(&up.weigh(hosts.clone(), &FilterProperties::default()))[0], "host4");
        assert_eq!(order(&down.weigh(hosts, &FilterProperties::default()))[0], "host1");
    }

    #[test]
    fn normalisation_stops_one_weigher_dominating() {
        // Huge raw spread on A (multiplier 1) vs small spread on B (multiplier 2):
        // after normalisation B decides.
        let a = Fixed(vec![("host1", 1_000_000.0), ("host2", 0.0)], 1.0);
        let b = Fixed(vec![("host1", 0.0), ("host2", 0.5)], 2.0);
        let chain = WeigherChain::new(vec![Box::new(a), Box::new(b)]);

        let hosts: Vec<_> = fixtures::fleet_states()
            .into_iter()
            .filter(|h| h.host == "host1" || h.host == "host2")
            .collect();
        let ranked = chain.weigh(hosts, &FilterProperties::default());
        assert_eq!(order(&ranked), vec!["host2", "host1"]);
        assert!((ranked[0].weight - 2.0).abs() < 1e-12);
        assert!((ranked[1].weight - 1.0).abs() < 1e-12);
    }
}
